//! Lockstep replay service
//!
//! Entry point for the market-data replay engine. It generates the synthetic
//! scenario, subscribes it through the data manager, and drives the demo
//! strategy over the synchronized sequence with graceful shutdown handling.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use lockstep_service::{
    initialize_logging_with_config, load_configuration, parse_mode, setup_signal_handlers,
    LoggingStrategy, ServiceState,
};

#[derive(Parser)]
#[command(name = "lockstep", version, about = "Market-data replay engine")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the pacing mode (backtest or live)
    #[arg(long)]
    mode: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration first: logging setup honors its level and format
    let mut config = load_configuration(cli.config.as_deref())?;
    if let Some(mode) = &cli.mode {
        config.synchronizer.mode = parse_mode(mode)?;
    }

    initialize_logging_with_config(&config.logging.level, &config.logging.format)?;

    info!("Starting lockstep service v{}", env!("CARGO_PKG_VERSION"));

    let service_state =
        Arc::new(ServiceState::new(config).context("Failed to initialize the service")?);
    info!("Service state initialized");

    setup_signal_handlers(Arc::clone(&service_state))?;
    info!("Signal handlers configured");

    let summary = service_state.run(LoggingStrategy::new("logging-demo"))?;

    if let Some(error) = &summary.error {
        anyhow::bail!("Run ended with a runtime error: {}", error);
    }

    info!(
        status = ?summary.status,
        slices = summary.slices,
        points = summary.points,
        "Lockstep service shutdown complete"
    );
    Ok(())
}
