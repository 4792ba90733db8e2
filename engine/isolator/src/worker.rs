//! Long-lived worker thread executing submitted jobs in order.

use crate::error::IsolatorError;
use crossbeam::channel::{unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A reusable worker thread. Jobs run one at a time, in submission order, on
/// the same OS thread.
///
/// Dropping the handle closes the queue; the thread drains what was already
/// submitted and exits. It is never force-killed, so an abandoned job keeps
/// the thread alive until the job itself returns.
pub struct WorkerThread {
    sender: Sender<Job>,
}

impl WorkerThread {
    pub fn new() -> Result<Self, IsolatorError> {
        let (sender, receiver) = unbounded::<Job>();
        thread::Builder::new()
            .name("isolator-worker".to_string())
            .spawn(move || {
                for job in receiver {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        warn!("worker job panicked, thread continues");
                    }
                }
                debug!("worker queue closed, thread exiting");
            })
            .map_err(|e| IsolatorError::Spawn(e.to_string()))?;
        Ok(Self { sender })
    }

    /// Queue a job for execution. Fails only once the worker has exited.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), IsolatorError> {
        self.sender.send(Box::new(job)).map_err(|_| IsolatorError::WorkerGone)
    }
}
