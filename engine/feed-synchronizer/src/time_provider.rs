//! Sources of the synchronization frontier.

use crate::subscription::SubscriptionRegistry;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Supplies the current frontier instant in UTC.
pub trait TimeProvider: Send + Sync {
    fn current_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock provider for live trading.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn current_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable provider for tests and stepped replay.
pub struct ManualTimeProvider {
    current: RwLock<DateTime<Utc>>,
}

impl ManualTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: RwLock::new(start) }
    }

    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.current.write() = time;
    }

    pub fn advance(&self, step: Duration) -> DateTime<Utc> {
        let mut current = self.current.write();
        *current += step;
        *current
    }
}

impl TimeProvider for ManualTimeProvider {
    fn current_utc(&self) -> DateTime<Utc> {
        *self.current.read()
    }
}

/// Backtest provider that jumps the frontier to the earliest pending data
/// point across every active subscription.
///
/// When nothing is pending the stored frontier is returned unchanged, which
/// the loop reads as a terminal signal. The frontier never moves backward,
/// so subscriptions added mid-run cannot rewind time.
pub struct SubscriptionFrontierTimeProvider {
    registry: Arc<SubscriptionRegistry>,
    frontier: RwLock<DateTime<Utc>>,
}

impl SubscriptionFrontierTimeProvider {
    pub(crate) fn new(start_utc: DateTime<Utc>, registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry, frontier: RwLock::new(start_utc) }
    }
}

impl TimeProvider for SubscriptionFrontierTimeProvider {
    fn current_utc(&self) -> DateTime<Utc> {
        let mut frontier = self.frontier.write();
        if let Some(next) = self.registry.min_next_emit_time() {
            if next > *frontier {
                *frontier = next;
            }
        }
        *frontier
    }
}
