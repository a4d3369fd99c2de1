use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

mod api;
mod asset;
mod chain;
mod composer;
mod config;
mod datum;
mod monitoring;
mod tx;
mod wallet;

use api::{AggregatorApiClient, QuoteProvider};
use asset::AssetId;
use chain::{ChainContext, HttpChainProvider, LinearFeeEstimator};
use composer::{SwapComposer, SwapIntent, SwapOutcome};
use config::{ConfigError, MagellanConfig, load_config};
use wallet::{WalletManager, derive_address};

#[derive(Parser, Debug)]
#[command(name = "magellan", version, about = "DEX 挂单交易组装机器人")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 magellan.yaml 或 config/magellan.yaml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 请求聚合器报价
    Quote(QuoteCmd),
    /// 组合并提交一笔挂单交易
    Swap(SwapCmd),
    /// 列出钱包当前可花费的 UTXO
    Utxos,
    /// 加密签名密钥，生成可写入配置的 wallet_keys 条目
    #[command(name = "wallet-encrypt")]
    WalletEncrypt,
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug)]
struct QuoteCmd {
    #[arg(long, default_value = "lovelace", help = "换出资产标识")]
    asset_in: String,
    #[arg(long, help = "换入资产标识，格式 <policy-hex>.<name-hex>")]
    asset_out: String,
    #[arg(long, help = "换出数量（人类单位）")]
    amount: Decimal,
}

#[derive(Args, Debug)]
struct SwapCmd {
    #[arg(long, default_value = "lovelace", help = "换出资产标识")]
    asset_in: String,
    #[arg(long, help = "换入资产标识，格式 <policy-hex>.<name-hex>")]
    asset_out: String,
    #[arg(long, help = "换出数量（人类单位）")]
    amount: Decimal,
    #[arg(long, help = "允许滑点（百分比，缺省取配置值）")]
    slippage: Option<Decimal>,
    #[arg(long, help = "只组合并打印，不提交")]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.global.logging)?;

    if config.bot.prometheus.enable {
        monitoring::try_init_prometheus(&config.bot.prometheus.listen)?;
    }

    match cli.command {
        Command::Quote(args) => handle_quote(args, &config).await?,
        Command::Swap(args) => handle_swap(args, &config).await?,
        Command::Utxos => handle_utxos(&config).await?,
        Command::WalletEncrypt => handle_wallet_encrypt()?,
        Command::Init(args) => init_configs(args)?,
    }

    Ok(())
}

fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn load_configuration(path: Option<PathBuf>) -> Result<MagellanConfig, ConfigError> {
    load_config(path)
}

fn http_client(config: &MagellanConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.bot.http_timeout_secs))
        .build()
        .map_err(|err| anyhow!("构建 HTTP 客户端失败: {err}"))
}

fn resolve_chain_url(config: &MagellanConfig) -> Result<Url> {
    let raw = env::var("MAGELLAN_CHAIN_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.global.chain_url.clone());
    Url::parse(raw.trim()).map_err(|err| anyhow!("链网关地址非法 {raw}: {err}"))
}

fn resolve_aggregator_url(config: &MagellanConfig) -> Result<Url> {
    let raw = env::var("MAGELLAN_AGGREGATOR_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.global.aggregator_url.clone());
    Url::parse(raw.trim()).map_err(|err| anyhow!("聚合器地址非法 {raw}: {err}"))
}

fn parse_asset(raw: &str) -> Result<AssetId> {
    raw.parse::<AssetId>()
        .map_err(|err| anyhow!("资产标识非法 {raw}: {err}"))
}

async fn handle_quote(args: QuoteCmd, config: &MagellanConfig) -> Result<()> {
    let dex = config.dex.resolve()?;
    let asset_in = parse_asset(&args.asset_in)?;
    let asset_out = parse_asset(&args.asset_out)?;
    let decimals = dex
        .decimals(&asset_in)
        .ok_or_else(|| anyhow!("资产 {asset_in} 未配置小数位"))?;
    let amount_in = asset::to_atomic(args.amount, decimals)?;

    let client = AggregatorApiClient::new(http_client(config)?, resolve_aggregator_url(config)?);
    let quote = client.quote(&asset_in, &asset_out, amount_in).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "assetIn": quote.asset_in.to_string(),
            "assetOut": quote.asset_out.to_string(),
            "amountIn": quote.amount_in.to_string(),
            "expectedOut": quote.expected_out.to_string(),
        }))?
    );
    Ok(())
}

async fn handle_swap(args: SwapCmd, config: &MagellanConfig) -> Result<()> {
    let dex = config.dex.resolve()?;
    let network = config.dex.network.to_network();
    let intent = SwapIntent {
        asset_in: parse_asset(&args.asset_in)?,
        asset_out: parse_asset(&args.asset_out)?,
        amount: args.amount,
        slippage_percent: args
            .slippage
            .unwrap_or(config.bot.default_slippage_percent),
    };
    let dry_run = args.dry_run || config.bot.dry_run;

    let signing_key = config::wallet::resolve_signing_key(&config.global.wallet)?;
    let owner = derive_address(&signing_key.verification_key(), network);
    let owner_bech32 = owner
        .to_bech32()
        .map_err(|err| anyhow!("地址编码失败: {err}"))?;
    info!(
        target: "swap",
        owner = %owner_bech32,
        dry_run,
        "开始执行 swap"
    );

    let client = http_client(config)?;
    let chain = Arc::new(HttpChainProvider::new(
        client.clone(),
        resolve_chain_url(config)?,
    ));
    let quotes = Arc::new(AggregatorApiClient::new(
        client,
        resolve_aggregator_url(config)?,
    ));
    let params = chain.protocol_params().await?;
    let fees = Arc::new(LinearFeeEstimator::new(params));
    let wallets = WalletManager::new(chain.clone());
    let composer = SwapComposer::new(quotes, fees, chain, dex);

    let outcome = composer
        .execute(&intent, &wallets, &owner, &signing_key, dry_run)
        .await?;
    match outcome {
        SwapOutcome::DryRun(composed) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "mode": "dry-run",
                    "txId": composed.id().to_string(),
                    "lockedValue": composed.locked_value.to_string(),
                    "minAssetOut": composed.order.min_asset_out.to_string(),
                    "changeValue": composed.change_value().to_string(),
                    "unsignedTx": hex::encode(composed.transaction.body_bytes()),
                }))?
            );
        }
        SwapOutcome::Submitted { tx_id, composed } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "mode": "submitted",
                    "txId": tx_id.to_string(),
                    "lockedValue": composed.locked_value.to_string(),
                    "minAssetOut": composed.order.min_asset_out.to_string(),
                }))?
            );
        }
    }
    Ok(())
}

async fn handle_utxos(config: &MagellanConfig) -> Result<()> {
    let network = config.dex.network.to_network();
    let signing_key = config::wallet::resolve_signing_key(&config.global.wallet)?;
    let owner = derive_address(&signing_key.verification_key(), network);

    let chain = HttpChainProvider::new(http_client(config)?, resolve_chain_url(config)?);
    let utxos = chain.list_utxos(&owner).await?;

    if utxos.is_empty() {
        println!("钱包没有可花费的 UTXO");
        return Ok(());
    }
    for utxo in utxos {
        println!("{:<68} {}", utxo.reference.to_string(), utxo.value);
    }
    Ok(())
}

fn handle_wallet_encrypt() -> Result<()> {
    let plaintext = env::var(config::wallet::ENV_PRIVATE_KEY)
        .map_err(|_| anyhow!("请通过环境变量 {} 提供待加密的密钥", config::wallet::ENV_PRIVATE_KEY))?;
    let password = env::var(config::wallet::ENV_WALLET_PASSWORD).map_err(|_| {
        anyhow!(
            "请通过环境变量 {} 提供加密密码",
            config::wallet::ENV_WALLET_PASSWORD
        )
    })?;

    // 先确认密钥本身可解析，避免把错误内容封进密文
    config::wallet::parse_signing_key(&plaintext).map_err(|message| anyhow!(message))?;
    let encrypted = config::wallet::encrypt_entry(plaintext.trim(), &password)
        .map_err(|message| anyhow!(message))?;

    println!("wallet_keys:");
    println!("  - remark: default");
    println!("    encrypted: {encrypted}");
    Ok(())
}

fn init_configs(args: InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let template = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/magellan.yaml"));
    let target_path = output_dir.join("magellan.yaml");
    if target_path.exists() && !args.force {
        println!(
            "跳过 {}（文件已存在，如需覆盖请加 --force）",
            target_path.display()
        );
        return Ok(());
    }

    fs::write(&target_path, template)?;
    println!("已写入 {}", target_path.display());
    Ok(())
}
