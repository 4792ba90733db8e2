//! Error types for bounded execution.

use thiserror::Error;

/// Failures surfaced by [`Isolator`](crate::Isolator) executions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IsolatorError {
    #[error("action exceeded its time limit of {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("{name} budget exceeded: {used} over a ceiling of {ceiling}")]
    BudgetExceeded { name: String, used: u64, ceiling: u64 },

    #[error("action ended without producing a result")]
    ActionFailed,

    #[error("worker thread is no longer accepting work")]
    WorkerGone,

    #[error("failed to spawn thread: {0}")]
    Spawn(String),
}

impl IsolatorError {
    /// True for the budget-class failures, wall clock or resource ceiling.
    pub fn is_timeout(&self) -> bool {
        matches!(self, IsolatorError::Timeout { .. } | IsolatorError::BudgetExceeded { .. })
    }
}
