//! Configuration for the synchronization loop.

use crate::{DEFAULT_LIVE_IDLE_WAIT_MS, DEFAULT_SUBSCRIPTION_LIMIT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pacing mode of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Time advances to the next pending data point; the sequence terminates
    /// when the feed runs dry.
    #[default]
    Backtest,
    /// Time follows the wall clock; an empty step idles instead of
    /// terminating.
    Live,
}

impl SyncMode {
    pub fn is_live(&self) -> bool {
        matches!(self, SyncMode::Live)
    }
}

/// Synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizerConfig {
    /// Pacing mode
    pub mode: SyncMode,

    /// Maximum number of distinct tradable symbols with active subscriptions.
    /// Canonical mirrors and internal feeds do not count toward the limit.
    pub subscription_limit: usize,

    /// How long a live loop sleeps when no subscription has new data, in
    /// milliseconds
    pub live_idle_wait_ms: u64,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            subscription_limit: DEFAULT_SUBSCRIPTION_LIMIT,
            live_idle_wait_ms: DEFAULT_LIVE_IDLE_WAIT_MS,
        }
    }
}

impl SynchronizerConfig {
    pub fn live_idle_wait(&self) -> Duration {
        Duration::from_millis(self.live_idle_wait_ms)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: SynchronizerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
