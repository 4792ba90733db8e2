//! # isolator
//!
//! Bounded execution harness for the strategy loop: runs a unit of work on a
//! worker thread, enforces a wall-clock deadline and an optional resource
//! ceiling, and signals cooperative cancellation. Timed-out work is
//! abandoned, never force-killed, so callers must treat its side effects as
//! unknown.

pub mod error;
pub mod isolator;
pub mod runtime_lock;
pub mod worker;

pub use error::IsolatorError;
pub use isolator::{CancelToken, Isolator, ResourceBudget};
pub use runtime_lock::{RuntimeGuard, RuntimeLock};
pub use worker::WorkerThread;

/// Current version of the isolator crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default interval between resource budget samples while waiting
pub const DEFAULT_BUDGET_POLL_MS: u64 = 100;
