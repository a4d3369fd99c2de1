mod fees;
mod provider;

use async_trait::async_trait;
use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use serde::Deserialize;
use thiserror::Error;

use crate::tx::{SignedTransaction, UnsignedTransaction, Utxo};

pub use fees::LinearFeeEstimator;
pub use provider::HttpChainProvider;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("链网关返回 {status}: {body}")]
    Http { status: u16, body: String },
    #[error("链网关响应格式非法: {0}")]
    Schema(String),
}

/// 提交失败的分类。除 InputsConsumed 可在重新选币后重组一次外，
/// 重试策略交由调用方决定，且绝不重发同一份已签名字节。
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("交易输入已被消费: {0}")]
    InputsConsumed(String),
    #[error("节点拒绝交易: {0}")]
    Rejected(String),
    #[error("提交请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("提交超时: {0}")]
    Timeout(String),
}

/// 链上费用与输出下限参数。
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParams {
    /// 线性费率的每字节系数。
    pub min_fee_a: u64,
    /// 线性费率的常数项。
    pub min_fee_b: u64,
    /// 单个输出允许携带的最小 lovelace 数量。
    pub min_utxo_value: u64,
}

/// 链上下文边界：查询可花费输出、读取协议参数、提交已签名交易。
#[async_trait]
pub trait ChainContext: Send + Sync {
    async fn list_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ChainError>;

    async fn protocol_params(&self) -> Result<ProtocolParams, ChainError>;

    async fn submit(&self, transaction: &SignedTransaction) -> Result<Hash<32>, SubmitError>;
}

/// 手续费估算边界。组装方只把结果代入平衡等式，自己不算费。
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    async fn estimate(&self, draft: &UnsignedTransaction) -> Result<u64, ChainError>;
}
