//! Strategy lifecycle status shared between the loop and its host.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Lifecycle of a strategy driven by the synchronizer.
///
/// `Running` is the only non-terminal status. The first terminal transition
/// wins; later transitions are ignored so a runtime error is never masked by
/// a subsequent stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyStatus {
    Running,
    /// The feed ran dry and the sequence ended normally.
    Completed,
    /// A fatal error ended the sequence.
    RuntimeError,
    /// The sequence was canceled or abandoned by its consumer.
    Stopped,
}

impl StrategyStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StrategyStatus::Running)
    }
}

/// Shared view of a running strategy, safe to poll from other threads.
#[derive(Debug)]
pub struct StrategyHandle {
    status: RwLock<StrategyStatus>,
    error: RwLock<Option<String>>,
}

impl StrategyHandle {
    pub fn new() -> Self {
        Self { status: RwLock::new(StrategyStatus::Running), error: RwLock::new(None) }
    }

    pub fn status(&self) -> StrategyStatus {
        *self.status.read()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.read().clone()
    }

    /// Move to a terminal status. No-op once a terminal status is set.
    pub fn transition(&self, status: StrategyStatus) {
        let mut current = self.status.write();
        if !current.is_terminal() {
            *current = status;
        }
    }

    /// Record a fatal error and move to `RuntimeError`.
    pub fn run_time_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(%message, "strategy runtime error");
        {
            let mut current = self.status.write();
            if current.is_terminal() {
                return;
            }
            *current = StrategyStatus::RuntimeError;
        }
        *self.error.write() = Some(message);
    }
}

impl Default for StrategyHandle {
    fn default() -> Self {
        Self::new()
    }
}
