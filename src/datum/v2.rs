use pallas_primitives::alonzo::PlutusData;

use super::{
    DatumCodec, DatumError, OrderDatum, ProtocolVersion, constr, plutus_address, plutus_asset,
    plutus_int, plutus_none,
};

/// 第二版订单脚本的 datum 布局。与 v1 的差异：
/// step 末尾追加 killable 标志（constr 1 = 不可强平），
/// 顶层追加订单过期时间（当前恒为 none，由批处理方兜底清理）。
pub struct V2Codec;

impl DatumCodec for V2Codec {
    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn build(&self, order: &OrderDatum) -> Result<PlutusData, DatumError> {
        let step = constr(
            0,
            vec![
                plutus_asset(&order.asset_out),
                plutus_int(order.min_asset_out),
                // killable: constr 1 [] = 订单不可被第三方强制终止
                constr(1, vec![]),
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
                plutus_none(),
            ],
        ))
    }
}
