use thiserror::Error;

use crate::api::QuoteError;
use crate::asset::{AssetError, AssetId};
use crate::chain::{ChainError, SubmitError};
use crate::datum::DatumError;

/// 组合失败的分类。除报价、费率、提交这几类瞬态错误可由调用方
/// 携带新鲜数据重试外，其余均为输入或配置问题，重试无意义。
#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("配置缺失或非法: {0}")]
    InvalidConfig(String),
    #[error("swap 意图非法: {0}")]
    InvalidIntent(String),
    #[error("资产对未被配置的池子支持: {asset_in} -> {asset_out}")]
    UnsupportedAssetPair {
        asset_in: AssetId,
        asset_out: AssetId,
    },
    #[error("价值运算失败: {0}")]
    Asset(#[from] AssetError),
    #[error("报价获取失败: {0}")]
    Quote(#[from] QuoteError),
    #[error("报价已超出有效窗口: 已过 {age_ms} ms, 窗口 {validity_ms} ms")]
    QuoteExpired { age_ms: u128, validity_ms: u128 },
    #[error("资产 {asset} 余额不足: 需要 {required}, 钱包共持有 {available}")]
    InsufficientFunds {
        asset: AssetId,
        required: u64,
        available: u64,
    },
    #[error("找零 {change} lovelace 低于链上最小输出 {min_utxo}，拒绝组装")]
    DustChange { change: u64, min_utxo: u64 },
    #[error("datum 构建失败: {0}")]
    Datum(#[from] DatumError),
    #[error("链上下文访问失败: {0}")]
    Chain(#[from] ChainError),
    #[error("交易提交失败: {0}")]
    Submit(#[from] SubmitError),
    #[error("{0}")]
    Internal(String),
}

pub type ComposerResult<T> = Result<T, ComposerError>;
