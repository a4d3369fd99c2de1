use pallas_primitives::alonzo::PlutusData;

use super::{
    DatumCodec, DatumError, OrderDatum, ProtocolVersion, constr, plutus_address, plutus_asset,
    plutus_int, plutus_none,
};

/// 初版订单脚本的 datum 布局：
///
/// ```text
/// constr 0 [
///   sender_address,
///   refund_address,
///   receiver_datum_hash,   -- 恒为 none，退款输出不携带 datum
///   step,                  -- constr 0 [desired_asset, minimum_receive]
///   batcher_fee,           -- 整数 lovelace
///   deposit,               -- 整数 lovelace
/// ]
/// ```
pub struct V1Codec;

impl DatumCodec for V1Codec {
    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn build(&self, order: &OrderDatum) -> Result<PlutusData, DatumError> {
        let step = constr(
            0,
            vec![
                plutus_asset(&order.asset_out),
                plutus_int(order.min_asset_out),
            ],
        );
        Ok(constr(
            0,
            vec![
                plutus_address(&order.sender)?,
                plutus_address(&order.refund)?,
                plutus_none(),
                step,
                plutus_int(order.batcher_fee.lovelace_amount()),
                plutus_int(order.deposit.lovelace_amount()),
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::tests::{order_fixture, unwrap_constr};
    use pallas_primitives::alonzo::BigInt;

    #[test]
    fn layout_has_six_fields() {
        let data = V1Codec.build(&order_fixture()).expect("datum");
        let (tag, fields) = unwrap_constr(&data);
        assert_eq!(tag, 121);
        assert_eq!(fields.len(), 6);
    }

    #[test]
    fn step_carries_minimum_receive() {
        let data = V1Codec.build(&order_fixture()).expect("datum");
        let (_, fields) = unwrap_constr(&data);
        let (step_tag, step_fields) = unwrap_constr(&fields[3]);
        assert_eq!(step_tag, 121);
        assert_eq!(step_fields.len(), 2);
        match &step_fields[1] {
            PlutusData::BigInt(BigInt::Int(int)) => {
                assert_eq!(int, &pallas_codec::utils::Int::from(95i64));
            }
            other => panic!("expected int, got {other:?}"),
        }
    }

    #[test]
    fn receiver_datum_is_none() {
        let data = V1Codec.build(&order_fixture()).expect("datum");
        let (_, fields) = unwrap_constr(&data);
        let (tag, none_fields) = unwrap_constr(&fields[2]);
        assert_eq!(tag, 122);
        assert!(none_fields.is_empty());
    }
}
