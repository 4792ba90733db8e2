//! The synchronization loop: advance the frontier, drain every subscription,
//! apply selections, emit one slice.

use crate::config::{SyncMode, SynchronizerConfig};
use crate::data_manager::DataManager;
use crate::error::SyncError;
use crate::handle::{StrategyHandle, StrategyStatus};
use crate::selection::apply_universe_selection;
use crate::time_provider::TimeProvider;
use crate::time_slice::TimeSlice;
use chrono::{DateTime, Utc};
use isolator::CancelToken;
use market_data::{MarketData, SecurityChanges, Symbol};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Assembles the slice at the current frontier.
///
/// Universe selection streams are routed to their universe instead of the
/// slice; internal feeds advance their securities but stay invisible. A
/// failed stream is dropped and the step carries on, while a selection
/// failure escapes as a fatal error.
pub struct SubscriptionSynchronizer {
    data_manager: Arc<DataManager>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SubscriptionSynchronizer {
    pub fn new(data_manager: Arc<DataManager>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { data_manager, time_provider }
    }

    pub fn sync(&self) -> Result<TimeSlice, SyncError> {
        let frontier = self.time_provider.current_utc();

        let mut data: Vec<MarketData> = Vec::new();
        let mut universe_data: Vec<(Symbol, Vec<MarketData>)> = Vec::new();
        let mut exhausted = Vec::new();

        for subscription in self.data_manager.subscriptions() {
            let points = subscription.take_until(frontier);
            if subscription.is_failed() {
                warn!(config = %subscription.config(), "dropping failed subscription");
                self.data_manager.remove_subscription(subscription.config());
            } else if subscription.is_finished() {
                exhausted.push(Arc::clone(&subscription));
            }

            if points.is_empty() {
                continue;
            }
            if subscription.is_universe_subscription() {
                if let Some(universe_symbol) = subscription.universe() {
                    universe_data.push((universe_symbol.clone(), points));
                }
            } else if !subscription.config().internal_feed {
                data.extend(points);
            }
        }

        for subscription in exhausted {
            debug!(config = %subscription.config(), "subscription exhausted");
            self.data_manager.remove_subscription(subscription.config());
        }

        let mut changes = SecurityChanges::none();
        for (universe_symbol, points) in universe_data {
            if let Some(universe) = self.data_manager.universe(&universe_symbol) {
                let delta =
                    apply_universe_selection(&self.data_manager, &universe, frontier, &points)?;
                changes = changes.combine(delta);
            }
        }

        Ok(TimeSlice::new(frontier, data, changes))
    }
}

/// Lazily produced sequence of slices, one per frontier advance.
///
/// In backtest mode the sequence is finite: a frontier that stops moving
/// while nothing structural happened means the feed ran dry, and iteration
/// ends after releasing every subscription. A live loop never terminates on
/// its own; it idles through empty steps and runs until canceled. The
/// sequence is not restartable.
pub struct Synchronizer {
    synchronizer: SubscriptionSynchronizer,
    data_manager: Arc<DataManager>,
    handle: Arc<StrategyHandle>,
    cancel: CancelToken,
    mode: SyncMode,
    live_idle_wait: Duration,
    previous_time: Option<DateTime<Utc>>,
    done: bool,
}

impl Synchronizer {
    pub fn new(
        data_manager: Arc<DataManager>,
        time_provider: Arc<dyn TimeProvider>,
        config: &SynchronizerConfig,
        handle: Arc<StrategyHandle>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            synchronizer: SubscriptionSynchronizer::new(Arc::clone(&data_manager), time_provider),
            data_manager,
            handle,
            cancel,
            mode: config.mode,
            live_idle_wait: config.live_idle_wait(),
            previous_time: None,
            done: false,
        }
    }

    fn finish(&mut self, status: StrategyStatus) {
        if self.done {
            return;
        }
        self.done = true;
        self.data_manager.dispose();
        self.handle.transition(status);
        info!(
            status = ?self.handle.status(),
            final_time = ?self.previous_time,
            "synchronization finished"
        );
    }
}

impl Iterator for Synchronizer {
    type Item = TimeSlice;

    fn next(&mut self) -> Option<TimeSlice> {
        while !self.done {
            if self.cancel.is_canceled() {
                info!("synchronization canceled");
                self.finish(StrategyStatus::Stopped);
                return None;
            }

            let slice = match self.synchronizer.sync() {
                Ok(slice) => slice,
                Err(err) => {
                    self.handle.run_time_error(err.to_string());
                    self.finish(StrategyStatus::RuntimeError);
                    return None;
                }
            };

            if self.mode.is_live() && slice.is_empty() {
                // Live heartbeats with nothing in them are not surfaced.
                thread::sleep(self.live_idle_wait);
                continue;
            }

            let is_duplicate = self.previous_time == Some(slice.time());
            self.previous_time = Some(slice.time());
            if !is_duplicate || !slice.is_empty() {
                // Anything already pulled from the sources must reach the
                // consumer, even at a repeated timestamp.
                return Some(slice);
            }

            // Backtest, repeated timestamp, nothing in it: the feed ran dry.
            self.finish(StrategyStatus::Completed);
            return None;
        }
        None
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        // A consumer that walks away mid-sequence still releases the feed.
        self.finish(StrategyStatus::Stopped);
    }
}
