//! Time- and resource-bounded execution.

use crate::error::IsolatorError;
use crate::worker::WorkerThread;
use crate::DEFAULT_BUDGET_POLL_MS;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Cooperative cancellation flag shared between an isolated action and the
/// thread waiting on it. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Secondary ceiling enforced while waiting for an action: a caller-supplied
/// sampler (process memory, open handles, whatever the host cares about)
/// polled at an interval and compared against a fixed ceiling. Exceeding it
/// fails the execution even when the wall-clock limit has not elapsed.
pub struct ResourceBudget {
    name: String,
    ceiling: u64,
    sampler: Box<dyn Fn() -> u64 + Send>,
    poll_interval: Duration,
}

impl ResourceBudget {
    pub fn new(
        name: impl Into<String>,
        ceiling: u64,
        sampler: impl Fn() -> u64 + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            ceiling,
            sampler: Box::new(sampler),
            poll_interval: Duration::from_millis(DEFAULT_BUDGET_POLL_MS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn check(&self) -> Result<(), IsolatorError> {
        let used = (self.sampler)();
        if used > self.ceiling {
            return Err(IsolatorError::BudgetExceeded {
                name: self.name.clone(),
                used,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }
}

/// Runs actions to completion within a wall-clock limit and an optional
/// resource budget.
///
/// Cancellation is advisory: on timeout the action is abandoned, never
/// force-killed. Each execution hands the action a fresh [`CancelToken`],
/// canceled when either budget is exceeded or [`Isolator::cancel`] is called;
/// a cooperative action observes the token and stops early. The caller must
/// not assume anything about an abandoned action's side effects.
pub struct Isolator {
    token: RwLock<CancelToken>,
}

impl Isolator {
    pub fn new() -> Self {
        Self { token: RwLock::new(CancelToken::new()) }
    }

    /// Token handed to the most recently started action.
    pub fn token(&self) -> CancelToken {
        self.token.read().clone()
    }

    /// Request cancellation of whatever action is currently running.
    pub fn cancel(&self) {
        self.token.read().cancel();
    }

    /// Run `action` on an ephemeral thread, waiting at most `time_limit`.
    pub fn execute<T, F>(
        &self,
        time_limit: Duration,
        budget: Option<ResourceBudget>,
        action: F,
    ) -> Result<T, IsolatorError>
    where
        T: Send + 'static,
        F: FnOnce(CancelToken) -> T + Send + 'static,
    {
        let token = self.arm();
        let action_token = token.clone();
        let (done_tx, done_rx) = bounded(1);
        thread::Builder::new()
            .name("isolator-task".to_string())
            .spawn(move || {
                let _ = done_tx.send(action(action_token));
            })
            .map_err(|e| IsolatorError::Spawn(e.to_string()))?;
        self.wait(done_rx, time_limit, budget, &token)
    }

    /// Run `action` on a long-lived worker, waiting at most `time_limit`.
    pub fn execute_with_worker<T, F>(
        &self,
        worker: &WorkerThread,
        time_limit: Duration,
        budget: Option<ResourceBudget>,
        action: F,
    ) -> Result<T, IsolatorError>
    where
        T: Send + 'static,
        F: FnOnce(CancelToken) -> T + Send + 'static,
    {
        let token = self.arm();
        let action_token = token.clone();
        let (done_tx, done_rx) = bounded(1);
        worker.submit(move || {
            let _ = done_tx.send(action(action_token));
        })?;
        self.wait(done_rx, time_limit, budget, &token)
    }

    /// Install a fresh token for the next action. An abandoned predecessor
    /// keeps seeing its own canceled token.
    fn arm(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.token.write() = token.clone();
        token
    }

    fn wait<T>(
        &self,
        done_rx: Receiver<T>,
        time_limit: Duration,
        budget: Option<ResourceBudget>,
        token: &CancelToken,
    ) -> Result<T, IsolatorError> {
        let deadline = Instant::now() + time_limit;
        loop {
            let now = Instant::now();
            if now >= deadline {
                token.cancel();
                let limit_ms = time_limit.as_millis() as u64;
                warn!(limit_ms, "isolated action timed out, abandoning it");
                return Err(IsolatorError::Timeout { limit_ms });
            }
            let mut step = deadline - now;
            if let Some(budget) = &budget {
                step = step.min(budget.poll_interval);
            }
            match done_rx.recv_timeout(step) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(budget) = &budget {
                        if let Err(err) = budget.check() {
                            token.cancel();
                            warn!(%err, "isolated action over budget, abandoning it");
                            return Err(err);
                        }
                    }
                }
                // The sender dropped without sending: the action panicked.
                Err(RecvTimeoutError::Disconnected) => return Err(IsolatorError::ActionFailed),
            }
        }
    }
}

impl Default for Isolator {
    fn default() -> Self {
        Self::new()
    }
}
