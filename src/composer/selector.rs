use std::collections::BTreeSet;

use crate::asset::AssetValue;
use crate::tx::{OutputRef, Utxo};

use super::error::{ComposerError, ComposerResult};

/// 选币结果：被选中的 UTXO（按引用排序）与它们的合计价值。
#[derive(Debug, Clone)]
pub struct Selection {
    pub utxos: Vec<Utxo>,
    pub total: AssetValue,
}

impl Selection {
    pub fn references(&self) -> Vec<OutputRef> {
        self.utxos.iter().map(|utxo| utxo.reference).collect()
    }
}

/// 贪心选币：对目标中的每种资产按数量从大到小取，数量相同时按
/// 输出引用排序保证确定性；一个 UTXO 只会被选中一次。
///
/// 失败判定基于该资产在整个 UTXO 集合中的总量，而不是贪心的
/// 中途累计，因而 `InsufficientFunds` 报出的缺口是准确的。
pub fn select_utxos(available: &[Utxo], target: &AssetValue) -> ComposerResult<Selection> {
    let mut chosen: BTreeSet<OutputRef> = BTreeSet::new();
    let mut picked: Vec<&Utxo> = Vec::new();

    for (asset, required) in target.iter() {
        let mut covered: u128 = picked
            .iter()
            .map(|utxo| u128::from(utxo.value.get(asset)))
            .sum();
        if covered >= u128::from(required) {
            continue;
        }

        let mut candidates: Vec<&Utxo> = available
            .iter()
            .filter(|utxo| !chosen.contains(&utxo.reference) && utxo.value.get(asset) > 0)
            .collect();
        candidates.sort_by(|a, b| {
            b.value
                .get(asset)
                .cmp(&a.value.get(asset))
                .then(a.reference.cmp(&b.reference))
        });

        for utxo in candidates {
            if covered >= u128::from(required) {
                break;
            }
            chosen.insert(utxo.reference);
            picked.push(utxo);
            covered += u128::from(utxo.value.get(asset));
        }

        if covered < u128::from(required) {
            let whole_set: u128 = available
                .iter()
                .map(|utxo| u128::from(utxo.value.get(asset)))
                .sum();
            return Err(ComposerError::InsufficientFunds {
                asset: asset.clone(),
                required,
                available: u64::try_from(whole_set).unwrap_or(u64::MAX),
            });
        }
    }

    let mut utxos: Vec<Utxo> = picked.into_iter().cloned().collect();
    utxos.sort_by_key(|utxo| utxo.reference);

    let mut total = AssetValue::new();
    for utxo in &utxos {
        total = total.checked_add(&utxo.value)?;
    }

    Ok(Selection { utxos, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;
    use pallas_addresses::Address;
    use pallas_crypto::hash::Hasher;

    fn owner() -> Address {
        Address::from_bech32(
            "addr1z8snz7c4974vzdpxu65ruphl3zjdvtxw8strf2c2tmqnxz2j2c79gy9l76sdg0xwhd7r0c0kna0tycz4y5s6mlenh8pq0xmsha",
        )
        .expect("bech32 address")
    }

    fn utxo(seed: &[u8], index: u64, value: AssetValue) -> Utxo {
        Utxo {
            reference: OutputRef::new(Hasher::<256>::hash(seed), index),
            value,
            address: owner(),
        }
    }

    fn min_token() -> AssetId {
        "e16c2dc8ae937e8d3790c7fd7168d7b994621ba14ca11415f39fed72.4d494e"
            .parse()
            .expect("MIN asset id")
    }

    #[test]
    fn picks_largest_first() {
        let available = vec![
            utxo(b"a", 0, AssetValue::lovelace(3_000_000)),
            utxo(b"b", 0, AssetValue::lovelace(10_000_000)),
            utxo(b"c", 0, AssetValue::lovelace(1_000_000)),
        ];
        let selection =
            select_utxos(&available, &AssetValue::lovelace(9_000_000)).expect("selection");
        assert_eq!(selection.utxos.len(), 1);
        assert_eq!(selection.total.lovelace_amount(), 10_000_000);
    }

    #[test]
    fn accumulates_until_target_met() {
        let available = vec![
            utxo(b"a", 0, AssetValue::lovelace(4_000_000)),
            utxo(b"b", 0, AssetValue::lovelace(3_000_000)),
            utxo(b"c", 0, AssetValue::lovelace(2_000_000)),
        ];
        let selection =
            select_utxos(&available, &AssetValue::lovelace(6_000_000)).expect("selection");
        assert_eq!(selection.utxos.len(), 2);
        assert_eq!(selection.total.lovelace_amount(), 7_000_000);
    }

    #[test]
    fn no_utxo_selected_twice_for_multiasset_target() {
        let mut both = AssetValue::lovelace(5_000_000);
        both.set(min_token(), 50);
        let available = vec![
            utxo(b"a", 0, both),
            utxo(b"b", 0, AssetValue::lovelace(1_000_000)),
        ];
        let mut target = AssetValue::lovelace(4_000_000);
        target.set(min_token(), 40);

        let selection = select_utxos(&available, &target).expect("selection");
        assert_eq!(selection.utxos.len(), 1);
        let references = selection.references();
        let unique: BTreeSet<_> = references.iter().collect();
        assert_eq!(unique.len(), references.len());
    }

    #[test]
    fn reports_exhaustive_available_total() {
        let available = vec![
            utxo(b"a", 0, AssetValue::lovelace(2_000_000)),
            utxo(b"b", 0, AssetValue::lovelace(3_000_000)),
        ];
        let err = select_utxos(&available, &AssetValue::lovelace(9_000_000)).unwrap_err();
        match err {
            ComposerError::InsufficientFunds {
                asset,
                required,
                available,
            } => {
                assert_eq!(asset, AssetId::Lovelace);
                assert_eq!(required, 9_000_000);
                assert_eq!(available, 5_000_000);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn empty_wallet_fails() {
        let err = select_utxos(&[], &AssetValue::lovelace(1)).unwrap_err();
        assert!(matches!(err, ComposerError::InsufficientFunds { .. }));
    }

    #[test]
    fn equal_amounts_break_ties_by_reference() {
        let a = utxo(b"a", 1, AssetValue::lovelace(5_000_000));
        let b = utxo(b"b", 0, AssetValue::lovelace(5_000_000));
        let smaller = a.reference.min(b.reference);

        let first = select_utxos(
            &[a.clone(), b.clone()],
            &AssetValue::lovelace(5_000_000),
        )
        .expect("selection");
        let second =
            select_utxos(&[b, a], &AssetValue::lovelace(5_000_000)).expect("selection");
        assert_eq!(first.references(), second.references());
        assert_eq!(first.references(), vec![smaller]);
    }
}
