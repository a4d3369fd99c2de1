use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;

use super::DexConfig;
use super::error::{ComposerError, ComposerResult};

/// 一次 swap 请求：换出资产、换入资产、人类单位数量与滑点百分比。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapIntent {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount: Decimal,
    pub slippage_percent: Decimal,
}

impl SwapIntent {
    /// 入口处唯一的校验闸门，通过后下游不再复查这些字段。
    pub fn validate(&self, config: &DexConfig) -> ComposerResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(ComposerError::InvalidIntent(format!(
                "交易数量必须大于零: {}",
                self.amount
            )));
        }
        if self.slippage_percent < Decimal::ZERO || self.slippage_percent > Decimal::ONE_HUNDRED {
            return Err(ComposerError::InvalidIntent(format!(
                "滑点需在 0 到 100 之间: {}",
                self.slippage_percent
            )));
        }
        if self.asset_in == self.asset_out {
            return Err(ComposerError::InvalidIntent(format!(
                "换入与换出资产相同: {}",
                self.asset_in
            )));
        }
        if !config.supports_pair(&self.asset_in, &self.asset_out) {
            return Err(ComposerError::UnsupportedAssetPair {
                asset_in: self.asset_in.clone(),
                asset_out: self.asset_out.clone(),
            });
        }
        Ok(())
    }
}
