mod quote;
pub mod serde_helpers;

use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::asset::AssetId;

pub use quote::{AggregatorApiClient, QuoteRequest, QuoteResponsePayload};

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("报价服务暂不可用: {0}")]
    Unavailable(String),
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("报价响应格式非法: {0}")]
    Schema(String),
}

/// 一次询价的结果。`obtained_at` 供组装方校验报价时效，
/// 过期的报价会得出错误的最小输出，绝不复用。
#[derive(Debug, Clone)]
pub struct Quote {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: u64,
    pub expected_out: u64,
    pub obtained_at: Instant,
}

/// 报价边界。组装器从不自行推算期望输出。
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<Quote, QuoteError>;
}
