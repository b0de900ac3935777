mod config;
mod disk;
mod mail;
mod monitoring;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::Config;
use crate::monitoring::{MonitoringScheduler, SetupContext, StatusPusher, setup_monitors};

/// Push based uptime monitoring agent
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file, defaults to ~/.config/uppe/agent.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug output (might include sensitive data!)
    #[arg(short, long)]
    verbose: bool,

    /// Validate the config and set up all monitors without running them
    #[arg(long)]
    check: bool,

    /// Print the loaded config with secrets redacted
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        logger::init_verbose();
    } else {
        logger::init();
    }

    let config = Config::from_config(cli.config.as_ref()).context("Error reading config")?;
    info!(node_name = %config.node_name, "Got assigned node name");

    if cli.print_config {
        print!("{config}");
    }

    let monitors = setup_monitors(&config, &SetupContext::system())
        .context("Invalid monitor configuration")?;

    if cli.check {
        for monitor in &monitors {
            let identity = monitor.identity();
            println!(
                "{} ({}) every {}s -> {}",
                identity.name, identity.kind, identity.interval_seconds, identity.host_url
            );
        }
        return Ok(());
    }

    let pusher = StatusPusher::new(Duration::from_secs(config.agent.push_timeout))
        .context("Failed to build HTTP client")?;
    let scheduler = MonitoringScheduler::new(Arc::new(pusher));

    info!("Starting monitors...");
    let handles = scheduler.schedule_monitors(monitors);
    info!(count = handles.len(), "All monitors started");

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
