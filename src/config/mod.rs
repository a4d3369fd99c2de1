mod loader;
mod types;
pub mod wallet;

pub use loader::{ConfigError, DEFAULT_CONFIG_PATHS, load_config};
pub use types::{
    BotConfig, DexSettings, GlobalConfig, LoggingConfig, MagellanConfig, NetworkKind,
    PoolSettings, PrometheusConfig, TokenSettings, WalletConfig, WalletKeyEntry,
};

pub(crate) fn default_chain_url() -> String {
    "http://127.0.0.1:3100".to_string()
}

pub(crate) fn default_aggregator_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) fn default_prometheus_listen() -> String {
    "127.0.0.1:9464".to_string()
}

pub(crate) fn default_http_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_batcher_fee_lovelace() -> u64 {
    2_000_000
}

pub(crate) fn default_deposit_lovelace() -> u64 {
    2_000_000
}

pub(crate) fn default_quote_validity_secs() -> u64 {
    30
}

pub(crate) fn default_slippage_percent() -> rust_decimal::Decimal {
    rust_decimal::Decimal::TEN
}
