use std::collections::BTreeMap;
use std::time::Duration;

use pallas_addresses::{Address, Network};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::asset::{AssetId, AssetValue};
use crate::composer::{ComposerError, DexConfig};
use crate::datum::ProtocolVersion;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MagellanConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub dex: DexSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    /// 链网关地址，提供 UTXO 查询、协议参数与交易提交。
    #[serde(default = "super::default_chain_url")]
    pub chain_url: String,
    /// DEX 聚合器报价服务地址。
    #[serde(default = "super::default_aggregator_url")]
    pub aggregator_url: String,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            chain_url: super::default_chain_url(),
            aggregator_url: super::default_aggregator_url(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// 明文签名密钥。生产环境建议留空，改用加密的 wallet_keys。
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub wallet_keys: Vec<WalletKeyEntry>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct WalletKeyEntry {
    pub remark: String,
    pub encrypted: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "super::default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// 未显式给出滑点时采用的默认值（百分比）。
    #[serde(default = "super::default_slippage_percent")]
    pub default_slippage_percent: Decimal,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            http_timeout_secs: super::default_http_timeout_secs(),
            default_slippage_percent: super::default_slippage_percent(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: super::default_prometheus_listen(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    #[default]
    Mainnet,
    Preprod,
}

impl NetworkKind {
    pub fn to_network(self) -> Network {
        match self {
            Self::Mainnet => Network::Mainnet,
            Self::Preprod => Network::Testnet,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolSettings {
    pub asset_a: String,
    pub asset_b: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSettings {
    pub id: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexSettings {
    #[serde(default)]
    pub network: NetworkKind,
    #[serde(default)]
    pub protocol: Option<ProtocolVersion>,
    #[serde(default)]
    pub order_address: String,
    #[serde(default = "super::default_batcher_fee_lovelace")]
    pub batcher_fee_lovelace: u64,
    #[serde(default = "super::default_deposit_lovelace")]
    pub deposit_lovelace: u64,
    #[serde(default = "super::default_quote_validity_secs")]
    pub quote_validity_secs: u64,
    #[serde(default)]
    pub pools: Vec<PoolSettings>,
    #[serde(default)]
    pub tokens: Vec<TokenSettings>,
}

impl DexSettings {
    /// 把面向文件的松散配置固化为组装器使用的强类型配置。
    pub fn resolve(&self) -> Result<DexConfig, ComposerError> {
        if self.order_address.trim().is_empty() {
            return Err(ComposerError::InvalidConfig(
                "dex.order_address 未配置".to_string(),
            ));
        }
        let order_address = Address::from_bech32(self.order_address.trim()).map_err(|err| {
            ComposerError::InvalidConfig(format!(
                "dex.order_address 非法 {}: {err}",
                self.order_address
            ))
        })?;

        let mut pools = Vec::with_capacity(self.pools.len());
        for pool in &self.pools {
            let asset_a: AssetId = pool.asset_a.parse().map_err(|err| {
                ComposerError::InvalidConfig(format!("池子资产非法 {}: {err}", pool.asset_a))
            })?;
            let asset_b: AssetId = pool.asset_b.parse().map_err(|err| {
                ComposerError::InvalidConfig(format!("池子资产非法 {}: {err}", pool.asset_b))
            })?;
            pools.push((asset_a, asset_b));
        }
        if pools.is_empty() {
            return Err(ComposerError::InvalidConfig(
                "dex.pools 为空，没有可交易的资产对".to_string(),
            ));
        }

        let mut decimals = BTreeMap::new();
        for token in &self.tokens {
            let asset: AssetId = token.id.parse().map_err(|err| {
                ComposerError::InvalidConfig(format!("代币标识非法 {}: {err}", token.id))
            })?;
            decimals.insert(asset, token.decimals);
        }

        Ok(DexConfig {
            protocol: self.protocol.unwrap_or(ProtocolVersion::V1),
            order_address,
            batcher_fee: AssetValue::lovelace(self.batcher_fee_lovelace),
            deposit: AssetValue::lovelace(self.deposit_lovelace),
            pools,
            decimals,
            quote_validity: Duration::from_secs(self.quote_validity_secs),
        })
    }
}
