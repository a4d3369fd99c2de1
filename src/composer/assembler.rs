use pallas_addresses::Address;

use crate::asset::{AssetError, AssetValue};
use crate::datum::EncodedDatum;
use crate::tx::{TxOutput, UnsignedTransaction};

use super::error::{ComposerError, ComposerResult};
use super::selector::Selection;

/// 一次组装所需的全部素材。费用由外部估算后代入。
pub struct AssemblyPlan<'a> {
    pub selection: &'a Selection,
    pub order_address: &'a Address,
    pub change_address: &'a Address,
    pub locked_value: &'a AssetValue,
    pub datum: &'a EncodedDatum,
}

/// 组装完整交易：锁定输出、找零输出与费用。返回前逐资产核验
/// `inputs == outputs + fee` 的平衡律；找零为空则不产生找零输出，
/// 找零低于链上最小输出时拒绝组装，绝不悄悄丢弃价值。
pub fn assemble(
    plan: &AssemblyPlan<'_>,
    fee: u64,
    min_utxo: u64,
) -> ComposerResult<UnsignedTransaction> {
    let fee_value = AssetValue::lovelace(fee);
    let needed = plan.locked_value.checked_add(&fee_value)?;

    let change = match plan.selection.total.checked_sub(&needed) {
        Ok(change) => change,
        Err(AssetError::InsufficientValue {
            asset,
            required: _,
            available,
        }) => {
            return Err(ComposerError::InsufficientFunds {
                asset: asset.clone(),
                required: needed.get(&asset),
                available,
            });
        }
        Err(err) => return Err(err.into()),
    };

    if !change.is_empty() && change.lovelace_amount() < min_utxo {
        return Err(ComposerError::DustChange {
            change: change.lovelace_amount(),
            min_utxo,
        });
    }

    let locked = TxOutput::new(plan.order_address.clone(), plan.locked_value.clone())
        .with_datum_hash(plan.datum.hash);
    let mut outputs = vec![locked];
    if !change.is_empty() {
        outputs.push(TxOutput::new(plan.change_address.clone(), change.clone()));
    }

    let transaction = UnsignedTransaction {
        inputs: plan.selection.references(),
        outputs,
        fee,
        datums: vec![plan.datum.bytes.clone()],
    };

    verify_balance(&plan.selection.total, &transaction)?;
    Ok(transaction)
}

/// 平衡律核验：逐资产比较输入合计与输出加费用的合计。
fn verify_balance(inputs_total: &AssetValue, transaction: &UnsignedTransaction) -> ComposerResult<()> {
    let mut spent = transaction.fee_value();
    for output in &transaction.outputs {
        spent = spent.checked_add(&output.value)?;
    }
    if &spent != inputs_total {
        return Err(ComposerError::Internal(format!(
            "资产平衡校验失败: 输入 {inputs_total}, 输出加费用 {spent}"
        )));
    }
    Ok(())
}
