//! fleet-reaperd — the zombie reaper daemon.
//!
//! Opens the fleet inventory and periodically sweeps it for instances
//! that are registered but unreachable, flagging them for shutdown.
//!
//! # Usage
//!
//! ```text
//! fleet-reaperd --data-dir /var/lib/fleet --config reaper.toml run
//! fleet-reaperd --data-dir /var/lib/fleet sweep --min-age 30m
//! fleet-reaperd --data-dir /var/lib/fleet list
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use fleet_inventory::StateStore;
use fleet_reaper::{Reaper, ReaperConfig, SweepContext};

#[derive(Parser)]
#[command(name = "fleet-reaperd", about = "Fleet zombie instance reaper")]
struct Cli {
    /// Data directory holding the inventory database.
    #[arg(long, global = true, default_value = "/var/lib/fleet")]
    data_dir: PathBuf,

    /// Path to reaper.toml. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep periodically until interrupted.
    Run {
        /// Override the grace period (e.g. "30m").
        #[arg(long)]
        min_age: Option<String>,

        /// Override the sweep interval (e.g. "1m").
        #[arg(long)]
        interval: Option<String>,
    },
    /// Run a single sweep and print its report as JSON.
    Sweep {
        /// Override the grace period (e.g. "30m").
        #[arg(long)]
        min_age: Option<String>,
    },
    /// Print the current inventory as JSON.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,fleet_reaperd=debug,fleet_reaper=debug".into());
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run { min_age, interval } => {
            if let Some(min_age) = min_age {
                config.min_age = min_age;
            }
            if let Some(interval) = interval {
                config.interval = interval;
            }
            run_daemon(&cli.data_dir, config).await
        }
        Command::Sweep { min_age } => {
            if let Some(min_age) = min_age {
                config.min_age = min_age;
            }
            run_once(&cli.data_dir, config).await
        }
        Command::List => list_inventory(&cli.data_dir),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReaperConfig> {
    match path {
        Some(path) => ReaperConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ReaperConfig::default()),
    }
}

fn open_store(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("inventory.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "inventory opened");
    Ok(store)
}

fn build_reaper(store: StateStore, config: &ReaperConfig) -> anyhow::Result<Reaper> {
    let probe = config.build_probe()?;
    let reaper = Reaper::from_config(Arc::new(store), probe, config)?;
    Ok(reaper)
}

async fn run_daemon(data_dir: &Path, config: ReaperConfig) -> anyhow::Result<()> {
    info!("fleet reaper starting");

    let store = open_store(data_dir)?;
    let reaper = build_reaper(store, &config)?;
    let interval = config.interval()?;
    let sweep_timeout = config.sweep_timeout()?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper_handle = tokio::spawn(async move {
        reaper.run(interval, sweep_timeout, shutdown_rx).await;
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for CTRL+C, shutting down");
    }
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // The loop cancels the in-flight sweep and exits.
    reaper_handle.await?;

    info!("fleet reaper stopped");
    Ok(())
}

async fn run_once(data_dir: &Path, config: ReaperConfig) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let reaper = build_reaper(store, &config)?;

    let mut ctx = SweepContext::background();
    if let Some(timeout) = config.sweep_timeout()? {
        ctx = ctx.with_timeout(timeout);
    }

    let report = reaper.run_sweep(&ctx).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn list_inventory(data_dir: &Path) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let instances = store.list_instances()?;
    println!("{}", serde_json::to_string_pretty(&instances)?);
    Ok(())
}
