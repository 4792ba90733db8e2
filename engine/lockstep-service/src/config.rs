//! Service configuration management

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use feed_synchronizer::{SyncMode, SynchronizerConfig};
use market_data::Resolution;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Synchronizer pacing and limits
    #[serde(default)]
    pub synchronizer: SynchronizerConfig,

    /// Synthetic replay data generation
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Service-level configuration
    #[serde(default)]
    pub service: ServiceSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synthetic replay scenario settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// First session date
    pub start: NaiveDate,

    /// Number of trading days to generate
    pub trading_days: u32,

    /// Bar resolution for generated sessions
    pub resolution: Resolution,

    /// Bars generated per symbol per session
    pub bars_per_day: u32,

    /// Equity roots to subscribe directly
    pub equities: Vec<String>,

    /// Futures product to roll through a continuous universe, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub future_root: Option<String>,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Wall-clock limit for the whole run, in seconds
    pub run_limit_secs: u64,

    /// Ceiling on emitted slices before the run is abandoned (0 disables it)
    pub max_slices: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default(),
            trading_days: 5,
            resolution: Resolution::Minute,
            bars_per_day: 60,
            equities: vec!["SPY".to_string(), "AAPL".to_string()],
            future_root: Some("ES".to_string()),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { run_limit_secs: 300, max_slices: 0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Load configuration from defaults, an optional file, and environment
/// variables
pub fn load_config(config_file: Option<&Path>) -> Result<ServiceConfig> {
    let mut config = match config_file {
        Some(path) => {
            tracing::debug!("Loading configuration from file: {:?}", path);
            load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => ServiceConfig::default(),
    };

    // Override with environment variables
    load_from_env(&mut config)?;

    // Validate configuration
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file
fn load_from_file(path: &Path) -> Result<ServiceConfig> {
    let text = std::fs::read_to_string(path)?;
    let config = toml::from_str(&text)?;
    Ok(config)
}

/// Load configuration from environment variables
fn load_from_env(config: &mut ServiceConfig) -> Result<()> {
    if let Ok(level) = std::env::var("LOCKSTEP_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Ok(format) = std::env::var("LOCKSTEP_LOG_FORMAT") {
        config.logging.format = format;
    }

    if let Ok(mode) = std::env::var("LOCKSTEP_MODE") {
        config.synchronizer.mode = parse_mode(&mode)?;
    }

    if let Ok(limit) = std::env::var("LOCKSTEP_SUBSCRIPTION_LIMIT") {
        config.synchronizer.subscription_limit =
            limit.parse().unwrap_or(config.synchronizer.subscription_limit);
    }

    if let Ok(secs) = std::env::var("LOCKSTEP_RUN_LIMIT_SECS") {
        config.service.run_limit_secs = secs.parse().unwrap_or(config.service.run_limit_secs);
    }

    Ok(())
}

/// Parse a pacing mode name as used on the command line and in the
/// environment
pub fn parse_mode(value: &str) -> Result<SyncMode> {
    match value.to_ascii_lowercase().as_str() {
        "backtest" => Ok(SyncMode::Backtest),
        "live" => Ok(SyncMode::Live),
        other => Err(anyhow::anyhow!("Invalid pacing mode: {}", other)),
    }
}

/// Validate configuration
fn validate_config(config: &ServiceConfig) -> Result<()> {
    // Validate log level
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    // Validate log format
    match config.logging.format.as_str() {
        "json" | "pretty" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    if config.synchronizer.subscription_limit == 0 {
        return Err(anyhow::anyhow!("Subscription limit must be at least 1"));
    }

    if config.service.run_limit_secs == 0 {
        return Err(anyhow::anyhow!("Run limit must be at least 1 second"));
    }

    if config.replay.trading_days == 0 {
        return Err(anyhow::anyhow!("Replay must cover at least one trading day"));
    }

    if config.replay.bars_per_day == 0 {
        return Err(anyhow::anyhow!("Replay must generate at least one bar per day"));
    }

    if config.replay.equities.is_empty() && config.replay.future_root.is_none() {
        return Err(anyhow::anyhow!("Replay has no equities and no futures product"));
    }

    Ok(())
}

/// Save configuration to a TOML file
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let mut config = ServiceConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_replay_is_rejected() {
        let mut config = ServiceConfig::default();
        config.replay.equities.clear();
        config.replay.future_root = None;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(parse_mode("live").unwrap(), SyncMode::Live);
        assert_eq!(parse_mode("Backtest").unwrap(), SyncMode::Backtest);
        assert!(parse_mode("paper").is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockstep.toml");

        let mut config = ServiceConfig::default();
        config.synchronizer.subscription_limit = 25;
        config.replay.equities = vec!["QQQ".to_string()];
        config.service.max_slices = 10_000;
        save_config(&config, &path).unwrap();

        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded.synchronizer.subscription_limit, 25);
        assert_eq!(loaded.replay.equities, vec!["QQQ".to_string()]);
        assert_eq!(loaded.service.max_slices, 10_000);
        assert_eq!(loaded.replay.start, config.replay.start);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[service]\nrun_limit_secs = 30\nmax_slices = 0\n").unwrap();

        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded.service.run_limit_secs, 30);
        assert_eq!(loaded.logging.level, "info");
        assert!(!loaded.replay.equities.is_empty());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(load_from_file(Path::new("/nonexistent/lockstep.toml")).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("LOCKSTEP_LOG_LEVEL", "debug");
        std::env::set_var("LOCKSTEP_MODE", "live");
        std::env::set_var("LOCKSTEP_SUBSCRIPTION_LIMIT", "7");

        let config = load_config(None).unwrap();

        std::env::remove_var("LOCKSTEP_LOG_LEVEL");
        std::env::remove_var("LOCKSTEP_MODE");
        std::env::remove_var("LOCKSTEP_SUBSCRIPTION_LIMIT");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.synchronizer.mode, SyncMode::Live);
        assert_eq!(config.synchronizer.subscription_limit, 7);
    }
}
