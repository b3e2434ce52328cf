//! shroud daemon: replays chain events into the local wallet store and
//! inspects the result.

use anyhow::{bail, Context};
use clap::Parser;
use shroud_crypto::ZkpKeys;
use shroud_store::LedgerStore;
use shroud_store_lmdb::LmdbEnvironment;
use shroud_sync::{Dispatch, KeyRing, ShutdownController, SyncConfig, SyncEngine};
use shroud_types::ChainEvent;
use shroud_utils::LogFormat;
use shroud_wallet_core::BalanceSummary;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "shroud-daemon", about = "shroud wallet sync daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, global = true, env = "SHROUD_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB store.
    #[arg(long, global = true, env = "SHROUD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log output: "human" or "json".
    #[arg(long, global = true, env = "SHROUD_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "SHROUD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Hex-encoded 32-byte root key the wallet keys are derived from.
    #[arg(long, global = true, env = "SHROUD_ROOT_KEY", hide_env_values = true)]
    root_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Feed a file of JSON-encoded chain events (one per line) through the sync engine.
    Replay {
        #[arg(long)]
        events: PathBuf,
    },
    /// Replay `events`, then print the Prometheus metrics it produced.
    Metrics {
        #[arg(long)]
        events: PathBuf,
    },
    /// Print spendable and pending balances.
    Balance,
    /// Discard everything confirmed after L2 block `to`.
    Rollback {
        #[arg(long)]
        to: u64,
    },
    /// Print the public key derived from the root key.
    Address,
    /// List the unspent commitments held by the root key.
    Commitments,
    /// Write a default configuration file.
    InitConfig {
        /// Output path; stdout when omitted.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SyncConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn parse_root_key(hex_key: &str) -> anyhow::Result<ZkpKeys> {
    let bytes = hex::decode(hex_key.trim().trim_start_matches("0x")).context("root key is not hex")?;
    let Ok(root) = <[u8; 32]>::try_from(bytes.as_slice()) else {
        bail!("root key must be 32 bytes, got {}", bytes.len());
    };
    Ok(ZkpKeys::from_root_key(&root))
}

fn key_ring(cli: &Cli) -> anyhow::Result<KeyRing> {
    match &cli.root_key {
        Some(hex_key) => Ok(KeyRing::new(vec![parse_root_key(hex_key)?])),
        None => {
            tracing::warn!("no root key configured, incoming notes will not be decrypted");
            Ok(KeyRing::default())
        }
    }
}

fn open_store(config: &SyncConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let env = LmdbEnvironment::open(&config.data_dir, config.map_size)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    Ok(Arc::new(env))
}

async fn replay(
    store: Arc<dyn LedgerStore>,
    keys: KeyRing,
    config: SyncConfig,
    events: PathBuf,
    print_metrics: bool,
) -> anyhow::Result<()> {
    let shutdown = ShutdownController::new();
    let engine = SyncEngine::new(store, keys, config, &shutdown)?;
    let file = std::fs::File::open(&events)
        .with_context(|| format!("opening {}", events.display()))?;

    let mut queued = 0usize;
    let mut dropped = 0usize;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ChainEvent = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid event", events.display(), index + 1))?;
        match engine.dispatch(event)? {
            Dispatch::Queued(_) => queued += 1,
            Dispatch::Dropped => dropped += 1,
        }
    }
    tracing::info!(queued, dropped, "events dispatched, waiting for processing");

    tokio::select! {
        result = engine.flush() => result?,
        _ = shutdown.wait_for_signal() => {
            tracing::info!("shutdown signal received, stopping replay");
        }
    }

    if print_metrics {
        print!("{}", engine.metrics().encode()?);
    }
    engine.close().await;
    tracing::info!("replay finished");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    shroud_utils::init_logging(config.log_format, &config.log_level);

    match &cli.command {
        Command::InitConfig { path } => {
            let rendered = SyncConfig::default().to_toml_string()?;
            match path {
                Some(path) => {
                    std::fs::write(path, rendered)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!("wrote default config to {}", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Command::Address => {
            let Some(hex_key) = &cli.root_key else {
                bail!("--root-key or SHROUD_ROOT_KEY is required");
            };
            println!("{}", parse_root_key(hex_key)?.zkp_public_key);
        }
        Command::Commitments => {
            let Some(hex_key) = &cli.root_key else {
                bail!("--root-key or SHROUD_ROOT_KEY is required");
            };
            let owner = parse_root_key(hex_key)?.zkp_public_key;
            let store = open_store(&config)?;
            let held = store.wallet_commitments(&owner)?;
            tracing::info!(count = held.len(), "listing commitments");
            println!("{}", serde_json::to_string_pretty(&held)?);
        }
        Command::Balance => {
            let store = open_store(&config)?;
            let summary = BalanceSummary::load(store.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Rollback { to } => {
            let store = open_store(&config)?;
            let shutdown = ShutdownController::new();
            let engine = SyncEngine::new(store, KeyRing::default(), config, &shutdown)?;
            let report = engine.rollback(*to).await?;
            tracing::info!(
                valid_to = report.valid_to,
                deleted_commitments = report.deleted_commitments,
                deleted_transactions = report.deleted_transactions,
                deleted_blocks = report.deleted_blocks,
                deleted_trees = report.deleted_trees,
                "rollback complete"
            );
            engine.close().await;
        }
        Command::Replay { events } | Command::Metrics { events } => {
            let print_metrics = matches!(cli.command, Command::Metrics { .. });
            if print_metrics && !config.enable_metrics {
                bail!("metrics are disabled in the configuration");
            }
            let keys = key_ring(&cli)?;
            let store = open_store(&config)?;
            tracing::info!(
                data_dir = %config.data_dir.display(),
                keys = keys.len(),
                "starting replay"
            );
            replay(store, keys, config, events.clone(), print_metrics).await?;
        }
    }

    Ok(())
}
