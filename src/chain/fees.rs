use async_trait::async_trait;

use crate::tx::UnsignedTransaction;

use super::{ChainError, FeeEstimator, ProtocolParams};

/// 线性费率估算：`min_fee_a * size + min_fee_b`，大小取完整交易体
/// 加上见证集的预留字节。确定性，相同草稿估出相同费用。
#[derive(Debug, Clone, Copy)]
pub struct LinearFeeEstimator {
    min_fee_a: u64,
    min_fee_b: u64,
}

/// 一把密钥的见证在 CBOR 中占用的字节预留（公钥 32 + 签名 64 + 框架）。
const WITNESS_RESERVE_BYTES: u64 = 102;

impl LinearFeeEstimator {
    pub fn new(params: ProtocolParams) -> Self {
        Self {
            min_fee_a: params.min_fee_a,
            min_fee_b: params.min_fee_b,
        }
    }
}

#[async_trait]
impl FeeEstimator for LinearFeeEstimator {
    async fn estimate(&self, draft: &UnsignedTransaction) -> Result<u64, ChainError> {
        let size = draft.body_bytes().len() as u64 + WITNESS_RESERVE_BYTES;
        Ok(self
            .min_fee_a
            .saturating_mul(size)
            .saturating_add(self.min_fee_b))
    }
}
