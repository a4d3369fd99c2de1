mod v1;
mod v2;

use std::fmt;
use std::str::FromStr;

use pallas_addresses::{Address, ShelleyDelegationPart, ShelleyPaymentPart};
use pallas_codec::minicbor;
use pallas_codec::utils::{Int, MaybeIndefArray};
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::BoundedBytes;
use pallas_primitives::alonzo::{BigInt, Constr, PlutusData};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{AssetId, AssetValue};

pub use v1::V1Codec;
pub use v2::V2Codec;

#[derive(Debug, Error)]
pub enum DatumError {
    #[error("订单地址形态不受支持: {0}")]
    UnsupportedAddress(String),
    #[error("datum CBOR 编码失败: {0}")]
    Encode(String),
}

/// 订单脚本的 datum 版本。不同版本的脚本期望不同的字段布局，
/// 新版本通过新增 codec 接入，组装方不感知差异。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(format!("未知的订单脚本版本: {other}")),
        }
    }
}

/// 挂单参数。`min_asset_out` 已按滑点折算完毕。
#[derive(Debug, Clone)]
pub struct OrderDatum {
    pub sender: Address,
    pub refund: Address,
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub min_asset_out: u64,
    pub batcher_fee: AssetValue,
    pub deposit: AssetValue,
}

/// 编码完成的 datum：CBOR 原文与其 blake2b-256 哈希。
#[derive(Debug, Clone)]
pub struct EncodedDatum {
    pub bytes: Vec<u8>,
    pub hash: Hash<32>,
}

/// datum 布局对脚本版本多态的接缝。
pub trait DatumCodec: Send + Sync {
    fn protocol(&self) -> ProtocolVersion;

    fn build(&self, order: &OrderDatum) -> Result<PlutusData, DatumError>;

    fn seal(&self, order: &OrderDatum) -> Result<EncodedDatum, DatumError> {
        let data = self.build(order)?;
        let bytes =
            minicbor::to_vec(&data).map_err(|err| DatumError::Encode(err.to_string()))?;
        let hash = Hasher::<256>::hash(&bytes);
        Ok(EncodedDatum { bytes, hash })
    }
}

pub fn codec_for(version: ProtocolVersion) -> Box<dyn DatumCodec> {
    match version {
        ProtocolVersion::V1 => Box::new(V1Codec),
        ProtocolVersion::V2 => Box::new(V2Codec),
    }
}

pub(crate) fn constr(index: u64, fields: Vec<PlutusData>) -> PlutusData {
    let fields = if fields.is_empty() {
        MaybeIndefArray::Def(fields)
    } else {
        MaybeIndefArray::Indef(fields)
    };
    PlutusData::Constr(Constr {
        tag: 121 + index,
        any_constructor: None,
        fields,
    })
}

pub(crate) fn plutus_bytes(raw: &[u8]) -> PlutusData {
    PlutusData::BoundedBytes(BoundedBytes::from(raw.to_vec()))
}

pub(crate) fn plutus_int(value: u64) -> PlutusData {
    if value <= i64::MAX as u64 {
        PlutusData::BigInt(BigInt::Int(Int::from(value as i64)))
    } else {
        let stripped: Vec<u8> = value
            .to_be_bytes()
            .iter()
            .skip_while(|byte| **byte == 0)
            .copied()
            .collect();
        PlutusData::BigInt(BigInt::BigUInt(BoundedBytes::from(stripped)))
    }
}

/// 资产编码为 `constr 0 [policy, name]`，基础币种两个字段均为空串。
pub(crate) fn plutus_asset(asset: &AssetId) -> PlutusData {
    match asset {
        AssetId::Lovelace => constr(0, vec![plutus_bytes(&[]), plutus_bytes(&[])]),
        AssetId::Token { policy, name } => {
            constr(0, vec![plutus_bytes(policy.as_ref()), plutus_bytes(name)])
        }
    }
}

/// 地址编码为脚本期望的凭据结构。仅支持 Shelley 形态的地址，
/// 其余形态无法表达质押凭据，直接拒绝。
pub(crate) fn plutus_address(address: &Address) -> Result<PlutusData, DatumError> {
    let shelley = match address {
        Address::Shelley(shelley) => shelley,
        Address::Byron(_) => {
            return Err(DatumError::UnsupportedAddress(
                "期望 Shelley 地址，实际为 Byron 地址".to_string(),
            ));
        }
        Address::Stake(_) => {
            return Err(DatumError::UnsupportedAddress(
                "期望 Shelley 地址，实际为 Stake 地址".to_string(),
            ));
        }
    };

    let payment = match shelley.payment() {
        ShelleyPaymentPart::Key(hash) => constr(0, vec![plutus_bytes(hash.as_ref())]),
        ShelleyPaymentPart::Script(hash) => constr(1, vec![plutus_bytes(hash.as_ref())]),
    };

    let delegation = match shelley.delegation() {
        ShelleyDelegationPart::Key(hash) => constr(
            0,
            vec![constr(0, vec![constr(0, vec![plutus_bytes(hash.as_ref())])])],
        ),
        ShelleyDelegationPart::Script(hash) => constr(
            0,
            vec![constr(0, vec![constr(1, vec![plutus_bytes(hash.as_ref())])])],
        ),
        _ => constr(1, vec![]),
    };

    Ok(constr(0, vec![payment, delegation]))
}

pub(crate) fn plutus_none() -> PlutusData {
    constr(1, vec![])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pallas_crypto::hash::Hasher;

    pub fn order_fixture() -> OrderDatum {
        let sender = Address::from_bech32(
            "addr1z8snz7c4974vzdpxu65ruphl3zjdvtxw8strf2c2tmqnxz2j2c79gy9l76sdg0xwhd7r0c0kna0tycz4y5s6mlenh8pq0xmsha",
        )
        .expect("bech32 address");
        let min: AssetId = "e16c2dc8ae937e8d3790c7fd7168d7b994621ba14ca11415f39fed72.4d494e"
            .parse()
            .expect("MIN asset id");
        OrderDatum {
            sender: sender.clone(),
            refund: sender,
            asset_in: AssetId::Lovelace,
            asset_out: min,
            min_asset_out: 95,
            batcher_fee: AssetValue::lovelace(2_000_000),
            deposit: AssetValue::lovelace(2_000_000),
        }
    }

    pub fn unwrap_constr(data: &PlutusData) -> (u64, &[PlutusData]) {
        match data {
            PlutusData::Constr(constr) => {
                let fields: &[PlutusData] = match &constr.fields {
                    MaybeIndefArray::Def(items) => items,
                    MaybeIndefArray::Indef(items) => items,
                };
                (constr.tag, fields)
            }
            other => panic!("expected constr, got {other:?}"),
        }
    }

    #[test]
    fn protocol_version_parse() {
        assert_eq!("v1".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V1));
        assert_eq!("V2".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V2));
        assert!("v3".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn plutus_int_handles_large_values() {
        match plutus_int(42) {
            PlutusData::BigInt(BigInt::Int(_)) => {}
            other => panic!("expected small int, got {other:?}"),
        }
        match plutus_int(u64::MAX) {
            PlutusData::BigInt(BigInt::BigUInt(bytes)) => {
                assert_eq!(bytes.to_vec(), u64::MAX.to_be_bytes().to_vec());
            }
            other => panic!("expected big uint, got {other:?}"),
        }
    }

    #[test]
    fn lovelace_asset_uses_empty_fields() {
        let (tag, fields) = {
            let data = plutus_asset(&AssetId::Lovelace);
            let (tag, fields) = unwrap_constr(&data);
            (tag, fields.len())
        };
        assert_eq!(tag, 121);
        assert_eq!(fields, 2);
    }

    #[test]
    fn shelley_address_encodes_payment_credential() {
        let order = order_fixture();
        let data = plutus_address(&order.sender).expect("address datum");
        let (tag, fields) = unwrap_constr(&data);
        assert_eq!(tag, 121);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn byron_address_is_rejected() {
        // Byron bootstrap 地址没有可编码的凭据结构
        let byron = pallas_addresses::ByronAddress::from_base58(
            "Ae2tdPwUPEZLs4HtbuNey7tK4hTKrwNwYtGqp7bDfCy2WdR3P6735W5Yfpe",
        )
        .expect("base58 address");
        assert!(plutus_address(&Address::Byron(byron)).is_err());
    }

    #[test]
    fn sealed_datum_hash_matches_bytes() {
        let codec = codec_for(ProtocolVersion::V1);
        let sealed = codec.seal(&order_fixture()).expect("seal datum");
        assert_eq!(sealed.hash, Hasher::<256>::hash(&sealed.bytes));
    }
}
