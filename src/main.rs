//! # Sweep: 2-of-3 Multisig Wallet Recovery
//!
//! Command line front end for the `multisig_sweep` library. Reads the primary
//! and backup mnemonics from the environment (or a `.env` file), the service
//! xpubs from a JSON file, and talks to either an Esplora explorer or a
//! Bitcoin Core node to find the wallet's funds.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Report the recoverable balance
//! sweep --network btc-testnet discover
//!
//! # Same, as JSON
//! sweep --network btc-testnet discover --json
//!
//! # Build a signed transaction paying everything to one address
//! sweep --network btc-mainnet --fee-rate 15 sweep --destination bc1q...
//!
//! # Inspect a single address
//! sweep address --path "M/0'/0/12"
//! ```
//!
//! ## Environment
//!
//! - `PRIMARY_MNEMONIC`, `PRIMARY_PASSPHRASE` (optional), `BACKUP_MNEMONIC`
//! - `ESPLORA_URL` to override the explorer for the selected network
//! - `RPC_URL`, `RPC_PORT`, `RPC_USER`, `RPC_PASSWORD` with `--rpc`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use multisig_sweep::config::{env as env_vars, esplora_base, files, sweep as sweep_config};
use multisig_sweep::session::SessionReport;
use multisig_sweep::utils::{address as address_fmt, amount, time};
use multisig_sweep::{
    AddressGenerator, ErrorPolicy, EsploraResolver, KeyManager, RpcResolver, ServiceKey, SweepConfig,
    SweepPath, SweepSession, UtxoResolver,
};
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "Recover funds from a 2-of-3 multisig HD wallet")]
struct Cli {
    /// Network: btc-mainnet, btc-testnet, btc-signet, btc-regtest
    #[arg(long, global = true, default_value = "btc-mainnet")]
    network: String,
    /// Use testnet regardless of --network
    #[arg(long, global = true, default_value_t = false)]
    testnet: bool,
    /// Addresses generated per discovery batch
    #[arg(long, global = true, default_value_t = sweep_config::DEFAULT_BATCH_SIZE)]
    batch_size: u32,
    /// Fee rate in sat/vB
    #[arg(long, global = true, default_value_t = sweep_config::DEFAULT_FEE_RATE)]
    fee_rate: u64,
    /// continue-on-error or fail-fast
    #[arg(long, global = true, default_value = "continue-on-error")]
    error_policy: ErrorPolicy,
    /// Scan key indices concurrently
    #[arg(long, global = true, default_value_t = false)]
    parallel: bool,
    /// Seconds to wait for one resolver batch
    #[arg(long, global = true, default_value_t = sweep_config::DEFAULT_RESOLVER_TIMEOUT.as_secs())]
    resolver_timeout: u64,
    /// JSON file listing the service xpubs
    #[arg(long, global = true, default_value = files::SERVICE_KEYS_FILE)]
    service_keys: String,
    /// Esplora API base URL
    #[arg(long, global = true)]
    esplora_url: Option<String>,
    /// Resolve UTXOs through Bitcoin Core instead of Esplora
    #[arg(long, global = true, default_value_t = false)]
    rpc: bool,
    /// Disable logging
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the wallet and report the recoverable balance
    Discover {
        /// Print the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Discover funds and build a signed sweep transaction
    Sweep {
        /// Address receiving the swept funds
        #[arg(short, long)]
        destination: String,
    },
    /// Print the multisig address for a derivation path
    Address {
        /// Derivation path, e.g. M/0'/0/12
        #[arg(short, long)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    if config.logging {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    match &cli.command {
        Commands::Discover { json } => {
            let session = open_session(&cli, config)?;
            discover(&session, *json).await?;
        }
        Commands::Sweep { destination } => {
            let session = open_session(&cli, config)?;
            sweep(&session, destination).await?;
        }
        Commands::Address { path } => {
            let keys = load_keys(&cli, &config)?;
            show_address(&keys, path)?;
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<SweepConfig> {
    let config = SweepConfig::new(&cli.network, cli.testnet)?
        .with_batch_size(cli.batch_size)?
        .with_fee_rate(cli.fee_rate)?
        .with_error_policy(cli.error_policy)
        .with_parallel_key_scans(cli.parallel)
        .with_resolver_timeout(Duration::from_secs(cli.resolver_timeout))
        .with_logging(!cli.quiet);
    Ok(config)
}

fn load_keys(cli: &Cli, config: &SweepConfig) -> Result<KeyManager> {
    let primary = env::var(env_vars::PRIMARY_MNEMONIC)
        .with_context(|| format!("{} is not set", env_vars::PRIMARY_MNEMONIC))?;
    let passphrase = env::var(env_vars::PRIMARY_PASSPHRASE).unwrap_or_default();
    let backup = env::var(env_vars::BACKUP_MNEMONIC)
        .with_context(|| format!("{} is not set", env_vars::BACKUP_MNEMONIC))?;

    let service_keys = ServiceKey::load_from_file(&cli.service_keys)
        .with_context(|| format!("Failed to load service keys from {}", cli.service_keys))?;

    let keys = KeyManager::from_mnemonics(&primary, &passphrase, &backup, &service_keys, config.network)?;
    Ok(keys)
}

fn build_resolver(cli: &Cli, config: &SweepConfig) -> Result<Arc<dyn UtxoResolver>> {
    if cli.rpc {
        return Ok(Arc::new(RpcResolver::new()?));
    }

    let api_base = cli
        .esplora_url
        .clone()
        .or_else(|| env::var(env_vars::ESPLORA_URL).ok())
        .unwrap_or_else(|| esplora_base(config.network).to_string());
    log::debug!("Using Esplora at {}", api_base);

    Ok(Arc::new(EsploraResolver::new(api_base, config.network)?))
}

fn open_session(cli: &Cli, config: SweepConfig) -> Result<SweepSession> {
    let keys = load_keys(cli, &config)?;
    let resolver = build_resolver(cli, &config)?;
    Ok(SweepSession::new(config, keys, resolver)?)
}

async fn run_discovery(session: &SweepSession) -> Result<SessionReport> {
    let config = session.config();
    println!(
        "🔍 Scanning key indices {:?} on {} (batch size {}) at {}",
        session.keys().key_indices(),
        config.network,
        config.sweep_batch_size,
        time::format_now()
    );

    let started = Instant::now();
    let report = session.discover().await?;
    println!("Scan finished in {}", time::format_duration(started.elapsed()));

    for error in report.errors.iter() {
        println!("⚠️  Partial result: {}", error);
    }
    Ok(report)
}

async fn discover(session: &SweepSession, json: bool) -> Result<()> {
    let report = run_discovery(session).await?;
    let data = &report.sweep_data;

    if json {
        println!("{}", serde_json::to_string_pretty(&data.summary())?);
        return Ok(());
    }

    println!("\n💰 Funded addresses:");
    for (address, entry) in data.address_utxos() {
        let value: u64 = entry.utxos.iter().map(|utxo| utxo.value).sum();
        println!(
            "  {:<20} {:<16} {} ({} outputs)",
            address_fmt::format_short(address),
            entry.path.to_string(),
            amount::format_dual(value),
            entry.utxos.len()
        );
    }

    let summary = data.summary();
    println!("\nAddresses searched: {}", summary.addresses_searched);
    println!("Outputs found:      {}", summary.output_count);
    println!("Total balance:      {}", amount::format_dual(summary.balance));
    Ok(())
}

async fn sweep(session: &SweepSession, destination: &str) -> Result<()> {
    let report = run_discovery(session).await?;
    if !report.errors.is_empty() {
        println!("Some key indices were not fully scanned; the sweep covers what was found.");
    }

    let signed = session.sweep(destination).await?;
    let swept: u64 = signed.tx.output.iter().map(|output| output.value.to_sat()).sum();

    println!("\n✅ Sweep transaction ready");
    println!("Txid:        {}", signed.txid());
    println!("Inputs:      {}", signed.tx.input.len());
    println!("Destination: {}", destination);
    println!("Amount:      {}", amount::format_dual(swept));
    println!("Fee:         {}", amount::format_dual(signed.fee));
    println!("\n{}", signed.to_hex());
    Ok(())
}

fn show_address(keys: &KeyManager, path: &str) -> Result<()> {
    let path: SweepPath = path.parse()?;
    let descriptor = AddressGenerator::new(keys).address_for_path(&path)?;

    println!("Path:          {}", descriptor.path);
    println!("Address:       {}", descriptor.address);
    println!("Redeem script: {}", descriptor.redeem_script.to_hex_string());
    Ok(())
}
