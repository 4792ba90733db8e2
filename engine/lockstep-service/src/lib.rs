//! # lockstep-service
//!
//! Composition root for the replay engine: configuration, logging setup, the
//! synthetic data scenario, and the bounded strategy loop over the
//! synchronized sequence.

pub mod config;
pub mod logging;
pub mod replay;
pub mod service;
pub mod signals;
pub mod strategy;

pub use config::{parse_mode, ServiceConfig};
pub use logging::{initialize_logging, initialize_logging_with_config};
pub use replay::{build_scenario, ReplayScenario};
pub use service::{RunSummary, ServiceState};
pub use signals::setup_signal_handlers;
pub use strategy::{LoggingStrategy, Strategy};

use anyhow::{Context, Result};
use std::path::Path;

/// Load the service configuration from defaults, an optional file, and the
/// environment
pub fn load_configuration(config_file: Option<&Path>) -> Result<ServiceConfig> {
    config::load_config(config_file).context("Failed to load service configuration")
}
