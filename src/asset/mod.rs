use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use pallas_crypto::hash::Hash;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// 基础币种 lovelace 的精度（1 ADA = 10^6 lovelace）。
pub const LOVELACE_DECIMALS: u32 = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("资产标识解析失败: {0}")]
    Parse(String),
    #[error("数量精度非法: {0}")]
    Precision(String),
    #[error("资产 {asset} 价值不足: 需要 {required}, 实际 {available}")]
    InsufficientValue {
        asset: AssetId,
        required: u64,
        available: u64,
    },
    #[error("资产 {asset} 数量溢出")]
    Overflow { asset: AssetId },
}

/// 链上可替代资产的标识：基础币种或 (policy, name) 原生代币。
///
/// 文本格式与聚合器接口一致：`lovelace` 或 `<policy-hex>.<name-hex>`。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetId {
    Lovelace,
    Token { policy: Hash<28>, name: Vec<u8> },
}

impl AssetId {
    pub fn token(policy: Hash<28>, name: impl Into<Vec<u8>>) -> Self {
        Self::Token {
            policy,
            name: name.into(),
        }
    }

    pub fn is_lovelace(&self) -> bool {
        matches!(self, Self::Lovelace)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lovelace => f.write_str("lovelace"),
            Self::Token { policy, name } => {
                write!(f, "{}.{}", policy, hex::encode(name))
            }
        }
    }
}

impl FromStr for AssetId {
    type Err = AssetError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("lovelace") {
            return Ok(Self::Lovelace);
        }

        let (policy_hex, name_hex) = trimmed
            .split_once('.')
            .ok_or_else(|| AssetError::Parse(format!("缺少 policy 与 name 的分隔符: {trimmed}")))?;
        let policy = Hash::<28>::from_str(policy_hex)
            .map_err(|err| AssetError::Parse(format!("policy 非法 {policy_hex}: {err}")))?;
        let name = hex::decode(name_hex)
            .map_err(|err| AssetError::Parse(format!("token name 非法 {name_hex}: {err}")))?;
        if name.len() > 32 {
            return Err(AssetError::Parse(format!(
                "token name 超过 32 字节: {name_hex}"
            )));
        }
        Ok(Self::Token { policy, name })
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

/// 一组资产到非负原子数量的映射。不变式：不存在数量为零的条目。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetValue {
    entries: BTreeMap<AssetId, u64>,
}

impl AssetValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lovelace(amount: u64) -> Self {
        Self::single(AssetId::Lovelace, amount)
    }

    pub fn single(asset: AssetId, amount: u64) -> Self {
        let mut value = Self::new();
        value.set(asset, amount);
        value
    }

    /// 写入一个条目，数量为零时移除，保持归一化。
    pub fn set(&mut self, asset: AssetId, amount: u64) {
        if amount == 0 {
            self.entries.remove(&asset);
        } else {
            self.entries.insert(asset, amount);
        }
    }

    pub fn get(&self, asset: &AssetId) -> u64 {
        self.entries.get(asset).copied().unwrap_or(0)
    }

    pub fn contains(&self, asset: &AssetId) -> bool {
        self.entries.contains_key(asset)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lovelace_amount(&self) -> u64 {
        self.get(&AssetId::Lovelace)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, u64)> {
        self.entries.iter().map(|(asset, qty)| (asset, *qty))
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.entries.keys()
    }

    /// 非基础币种的条目。
    pub fn tokens(&self) -> impl Iterator<Item = (&Hash<28>, &[u8], u64)> {
        self.entries.iter().filter_map(|(asset, qty)| match asset {
            AssetId::Lovelace => None,
            AssetId::Token { policy, name } => Some((policy, name.as_slice(), *qty)),
        })
    }

    pub fn checked_add(&self, other: &AssetValue) -> Result<AssetValue, AssetError> {
        let mut sum = self.clone();
        for (asset, qty) in other.iter() {
            let merged = sum
                .get(asset)
                .checked_add(qty)
                .ok_or_else(|| AssetError::Overflow {
                    asset: asset.clone(),
                })?;
            sum.set(asset.clone(), merged);
        }
        Ok(sum)
    }

    /// 逐条目做减法，任一条目不足即失败并指出缺口。
    pub fn checked_sub(&self, other: &AssetValue) -> Result<AssetValue, AssetError> {
        let mut rest = self.clone();
        for (asset, qty) in other.iter() {
            let available = rest.get(asset);
            let remaining =
                available
                    .checked_sub(qty)
                    .ok_or_else(|| AssetError::InsufficientValue {
                        asset: asset.clone(),
                        required: qty,
                        available,
                    })?;
            rest.set(asset.clone(), remaining);
        }
        Ok(rest)
    }
}

impl fmt::Display for AssetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("∅");
        }
        let mut first = true;
        for (asset, qty) in self.iter() {
            if !first {
                f.write_str(" + ")?;
            }
            write!(f, "{qty} {asset}")?;
            first = false;
        }
        Ok(())
    }
}

/// 人类单位转原子单位，多余的小数位向下截断，绝不向上取整。
pub fn to_atomic(amount: Decimal, decimals: u32) -> Result<u64, AssetError> {
    if amount.is_sign_negative() {
        return Err(AssetError::Precision(format!("数量不能为负: {amount}")));
    }
    if decimals > 18 {
        return Err(AssetError::Precision(format!(
            "精度超出支持范围: {decimals}"
        )));
    }

    let factor = Decimal::from(10u64.pow(decimals));
    let scaled = amount
        .checked_mul(factor)
        .ok_or_else(|| AssetError::Precision(format!("数量超出可表示范围: {amount}")))?;
    scaled
        .trunc()
        .to_u64()
        .ok_or_else(|| AssetError::Precision(format!("原子数量超出 u64: {amount}")))
}

/// 按滑点比例折算的最小可接受输出：floor(expected * (1 - slippage/100))。
pub fn min_receive(expected_out: u64, slippage_percent: Decimal) -> u64 {
    let factor = (Decimal::ONE_HUNDRED - slippage_percent) / Decimal::ONE_HUNDRED;
    (Decimal::from(expected_out) * factor)
        .floor()
        .to_u64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_token() -> AssetId {
        "e16c2dc8ae937e8d3790c7fd7168d7b994621ba14ca11415f39fed72.4d494e"
            .parse()
            .expect("MIN asset id")
    }

    #[test]
    fn parse_and_display_round_trip() {
        assert_eq!("lovelace".parse::<AssetId>(), Ok(AssetId::Lovelace));
        let min = min_token();
        assert_eq!(min.to_string().parse::<AssetId>(), Ok(min));
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!("not-an-asset".parse::<AssetId>().is_err());
        assert!("abcd.4d494e".parse::<AssetId>().is_err());
    }

    #[test]
    fn set_zero_keeps_value_normalized() {
        let mut value = AssetValue::lovelace(5);
        value.set(AssetId::Lovelace, 0);
        assert!(value.is_empty());
        assert!(!value.contains(&AssetId::Lovelace));
    }

    #[test]
    fn checked_sub_reports_shortfall() {
        let held = AssetValue::lovelace(100);
        let wanted = AssetValue::lovelace(150);
        let err = held.checked_sub(&wanted).unwrap_err();
        assert_eq!(
            err,
            AssetError::InsufficientValue {
                asset: AssetId::Lovelace,
                required: 150,
                available: 100,
            }
        );
    }

    #[test]
    fn checked_sub_drops_emptied_entries() {
        let mut held = AssetValue::lovelace(100);
        held.set(min_token(), 7);
        let spent = AssetValue::single(min_token(), 7);
        let rest = held.checked_sub(&spent).expect("subtract");
        assert_eq!(rest, AssetValue::lovelace(100));
    }

    #[test]
    fn to_atomic_truncates_excess_digits() {
        let amount: Decimal = "1.2345678".parse().unwrap();
        assert_eq!(to_atomic(amount, 6), Ok(1_234_567));
    }

    #[test]
    fn to_atomic_rejects_negative() {
        let amount: Decimal = "-1".parse().unwrap();
        assert!(to_atomic(amount, 6).is_err());
    }

    #[test]
    fn min_receive_floor_rule() {
        assert_eq!(min_receive(100, "5".parse().unwrap()), 95);
        assert_eq!(min_receive(100, Decimal::ZERO), 100);
        assert_eq!(min_receive(100, Decimal::ONE_HUNDRED), 0);
        // 99 * 0.995 = 98.505，向下取整
        assert_eq!(min_receive(99, "0.5".parse().unwrap()), 98);
    }
}
