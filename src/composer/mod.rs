pub mod assembler;
pub mod error;
pub mod intent;
pub mod selector;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ed25519_consensus::SigningKey;
use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use tracing::{info, warn};

use crate::api::{Quote, QuoteProvider};
use crate::asset::{AssetId, AssetValue, LOVELACE_DECIMALS, min_receive, to_atomic};
use crate::chain::{ChainContext, FeeEstimator, SubmitError};
use crate::datum::{DatumCodec, OrderDatum, ProtocolVersion, codec_for};
use crate::monitoring::events;
use crate::tx::{self, UnsignedTransaction};
use crate::wallet::{WalletContext, WalletManager};

pub use error::{ComposerError, ComposerResult};
pub use intent::SwapIntent;
pub use selector::Selection;

use assembler::AssemblyPlan;

/// 目标 DEX 在某个网络上的完整配置，由调用方构造一次后显式传入。
#[derive(Debug, Clone)]
pub struct DexConfig {
    pub protocol: ProtocolVersion,
    /// 订单脚本地址，锁定输出落在这里。
    pub order_address: Address,
    pub batcher_fee: AssetValue,
    pub deposit: AssetValue,
    /// 支持的资产对，两个方向都可交易。
    pub pools: Vec<(AssetId, AssetId)>,
    /// 各资产的小数位，lovelace 不必配置。
    pub decimals: BTreeMap<AssetId, u32>,
    /// 报价的有效窗口，超窗的报价作废。
    pub quote_validity: Duration,
}

impl DexConfig {
    pub fn decimals(&self, asset: &AssetId) -> Option<u32> {
        if asset.is_lovelace() {
            return Some(LOVELACE_DECIMALS);
        }
        self.decimals.get(asset).copied()
    }

    pub fn supports_pair(&self, asset_in: &AssetId, asset_out: &AssetId) -> bool {
        self.pools.iter().any(|(a, b)| {
            (a == asset_in && b == asset_out) || (a == asset_out && b == asset_in)
        })
    }
}

/// 组合完成的交易以及组合时使用的素材。
#[derive(Debug, Clone)]
pub struct ComposedTransaction {
    pub transaction: UnsignedTransaction,
    pub order: OrderDatum,
    pub quote: Quote,
    pub selection: Selection,
    pub locked_value: AssetValue,
}

impl ComposedTransaction {
    pub fn id(&self) -> Hash<32> {
        self.transaction.id()
    }

    /// 找零输出的价值，恰好花光时为空。
    pub fn change_value(&self) -> AssetValue {
        self.transaction
            .outputs
            .get(1)
            .map(|output| output.value.clone())
            .unwrap_or_default()
    }
}

/// 一次 swap 执行的结果。
#[derive(Debug)]
pub enum SwapOutcome {
    /// dry-run 只组合不提交。
    DryRun(ComposedTransaction),
    Submitted {
        tx_id: Hash<32>,
        composed: ComposedTransaction,
    },
}

/// 把 swap 意图组合成挂单交易的流水线：校验、折算、询价、选币、
/// 组装、签名与提交。除提交外整条流水线是确定性的纯计算。
pub struct SwapComposer {
    quotes: Arc<dyn QuoteProvider>,
    fees: Arc<dyn FeeEstimator>,
    chain: Arc<dyn ChainContext>,
    codec: Box<dyn DatumCodec>,
    config: DexConfig,
}

impl SwapComposer {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        fees: Arc<dyn FeeEstimator>,
        chain: Arc<dyn ChainContext>,
        config: DexConfig,
    ) -> Self {
        let codec = codec_for(config.protocol);
        Self {
            quotes,
            fees,
            chain,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &DexConfig {
        &self.config
    }

    /// 组合一笔挂单交易。不产生副作用，失败不留半成品。
    pub async fn compose(
        &self,
        intent: &SwapIntent,
        wallet: &WalletContext,
    ) -> ComposerResult<ComposedTransaction> {
        intent.validate(&self.config)?;

        let decimals = self
            .config
            .decimals(&intent.asset_in)
            .ok_or_else(|| {
                ComposerError::InvalidConfig(format!("资产 {} 未配置小数位", intent.asset_in))
            })?;
        let amount_in = to_atomic(intent.amount, decimals)?;
        if amount_in == 0 {
            return Err(ComposerError::InvalidIntent(format!(
                "数量折算为零个原子单位: {}",
                intent.amount
            )));
        }

        let quote = self
            .quotes
            .quote(&intent.asset_in, &intent.asset_out, amount_in)
            .await?;
        if quote.expected_out == 0 {
            return Err(ComposerError::Quote(crate::api::QuoteError::Unavailable(
                "期望输出为零".to_string(),
            )));
        }
        let age = quote.obtained_at.elapsed();
        if age > self.config.quote_validity {
            return Err(ComposerError::QuoteExpired {
                age_ms: age.as_millis(),
                validity_ms: self.config.quote_validity.as_millis(),
            });
        }

        let min_asset_out = min_receive(quote.expected_out, intent.slippage_percent);
        let order = OrderDatum {
            sender: wallet.owner.clone(),
            refund: wallet.owner.clone(),
            asset_in: intent.asset_in.clone(),
            asset_out: intent.asset_out.clone(),
            min_asset_out,
            batcher_fee: self.config.batcher_fee.clone(),
            deposit: self.config.deposit.clone(),
        };
        let datum = self.codec.seal(&order)?;

        let locked_value = AssetValue::single(intent.asset_in.clone(), amount_in)
            .checked_add(&self.config.batcher_fee)?
            .checked_add(&self.config.deposit)?;

        let selection = selector::select_utxos(&wallet.utxos, &locked_value)?;
        let params = self.chain.protocol_params().await?;

        let plan = AssemblyPlan {
            selection: &selection,
            order_address: &self.config.order_address,
            change_address: &wallet.owner,
            locked_value: &locked_value,
            datum: &datum,
        };
        let draft = assembler::assemble(&plan, 0, params.min_utxo_value)?;
        let fee = self.fees.estimate(&draft).await?;
        let transaction = assembler::assemble(&plan, fee, params.min_utxo_value)?;

        info!(
            target: "composer",
            asset_in = %intent.asset_in,
            asset_out = %intent.asset_out,
            amount_in,
            expected_out = quote.expected_out,
            min_asset_out,
            fee,
            inputs = transaction.inputs.len(),
            tx_id = %transaction.id(),
            "挂单交易组合完成"
        );

        Ok(ComposedTransaction {
            transaction,
            order,
            quote,
            selection,
            locked_value,
        })
    }

    /// 签名并提交。提交失败原样上报，绝不自动重发同一份字节。
    pub async fn sign_and_submit(
        &self,
        composed: &ComposedTransaction,
        key: &SigningKey,
    ) -> Result<Hash<32>, SubmitError> {
        let signed = tx::sign(composed.transaction.clone(), key);
        self.chain.submit(&signed).await
    }

    /// 完整执行一次 swap：持有钱包锁，快照、组合、提交。
    /// 节点报输入已被消费时重新快照并重组一次，其余失败交调用方。
    pub async fn execute(
        &self,
        intent: &SwapIntent,
        wallets: &WalletManager,
        owner: &Address,
        key: &SigningKey,
        dry_run: bool,
    ) -> ComposerResult<SwapOutcome> {
        // 选币到提交视作对 UTXO 集合的一次逻辑事务
        let _guard = wallets.lock(owner).await?;

        let wallet = wallets.snapshot(owner).await?;
        let composed = self.compose(intent, &wallet).await?;
        events::swap_composed(&intent.asset_in, &intent.asset_out);

        if dry_run {
            return Ok(SwapOutcome::DryRun(composed));
        }

        match self.sign_and_submit(&composed, key).await {
            Ok(tx_id) => {
                events::swap_submitted(&intent.asset_in, &intent.asset_out);
                Ok(SwapOutcome::Submitted { tx_id, composed })
            }
            Err(SubmitError::InputsConsumed(reason)) => {
                warn!(
                    target: "composer",
                    reason = %reason,
                    "交易输入已被消费，重新快照并重组一次"
                );
                events::swap_reselected(&intent.asset_in, &intent.asset_out);

                let wallet = wallets.snapshot(owner).await?;
                let composed = self.compose(intent, &wallet).await?;
                let tx_id = self.sign_and_submit(&composed, key).await?;
                events::swap_submitted(&intent.asset_in, &intent.asset_out);
                Ok(SwapOutcome::Submitted { tx_id, composed })
            }
            Err(err) => {
                events::swap_failed(&intent.asset_in, &intent.asset_out, "submit");
                Err(err.into())
            }
        }
    }
}
