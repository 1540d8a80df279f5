//! rrm-daemon - polls CI build status per branch and reports it

use anyhow::{Context, Result};
use clap::Parser;
use remote_run_monitor_core::config::{ConfigOverrides, resolve_config};
use remote_run_monitor_daemon::daemon;
use remote_run_monitor_daemon::monitor::CiProviderRegistry;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// rrm-daemon - polls CI build status per branch and reports it
#[derive(Parser, Debug)]
#[command(name = "rrm-daemon")]
#[command(about = "Poll remote CI runs for your branches and report their status")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Trigger schedule (cron with seconds, or "@every 10s")
    #[arg(long, value_name = "EXPR")]
    schedule: Option<String>,

    /// CI provider (teamcity, github)
    #[arg(long, value_name = "NAME")]
    provider: Option<String>,

    /// Branch to monitor (repeatable; replaces configured branches)
    #[arg(long = "branch", value_name = "NAME")]
    branches: Vec<String>,

    /// Run a single poll cycle, print the message log and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        remote_run_monitor_core::logging::init_with_level(tracing::Level::DEBUG);
    } else {
        remote_run_monitor_core::logging::init();
    }

    info!("rrm-daemon {} starting", env!("CARGO_PKG_VERSION"));

    let home_dir = remote_run_monitor_core::home::get_home_dir()
        .context("Failed to determine home directory")?;
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;

    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        schedule: args.schedule.clone(),
        provider: args.provider.clone(),
        branches: args.branches.clone(),
    };
    let config = resolve_config(&overrides, &current_dir, &home_dir)
        .context("Failed to resolve configuration")?;

    if let Some(config_path) = &args.config {
        info!("Loaded config from: {}", config_path.display());
    }

    let registry = CiProviderRegistry::with_builtins();
    let (monitor_config, monitor) =
        daemon::build_monitor(&config, &registry, &current_dir, &home_dir)?;

    if args.once {
        let rendered = daemon::run_once(&monitor).await;
        print!("{rendered}");
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    daemon::spawn_signal_handler(cancel_token.clone());

    daemon::run(monitor, &monitor_config, cancel_token)
        .await
        .context("Daemon event loop failed")?;

    info!("rrm-daemon shutdown complete");
    Ok(())
}
