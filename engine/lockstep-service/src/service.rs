//! Service state management and the bounded run loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use feed_synchronizer::{
    DataManager, RealTimeProvider, StrategyHandle, StrategyStatus, SyncMode, Synchronizer,
    TimeProvider,
};
use isolator::{Isolator, ResourceBudget};
use market_data::{
    ChainProvider, NormalizationMode, SubscriptionConfigService, SubscriptionRequest, Symbol,
    UniverseSettings,
};
use universe_coordinator::ContinuousContractUniverse;

use crate::config::ServiceConfig;
use crate::replay::{self, ReplayScenario};
use crate::strategy::Strategy;

/// Outcome of one bounded run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: StrategyStatus,
    pub error: Option<String>,
    pub slices: u64,
    pub points: u64,
    pub final_time: Option<DateTime<Utc>>,
}

/// Wired components of one run: the data manager with its subscriptions and
/// universes, the status handle, and the isolator bounding the loop.
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    data_manager: Arc<DataManager>,
    handle: Arc<StrategyHandle>,
    isolator: Isolator,
    shutdown: Arc<AtomicBool>,
}

impl ServiceState {
    /// Generate the replay scenario and subscribe everything it describes.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        info!("Initializing service components...");

        let ReplayScenario { factory, chain, equities, canonical, start_utc, end_utc } =
            replay::build_scenario(&config.replay);
        info!(
            equities = equities.len(),
            continuous = canonical.is_some(),
            start = %start_utc,
            end = %end_utc,
            "Replay scenario generated"
        );

        let data_manager = Arc::new(DataManager::new(
            &config.synchronizer,
            Arc::new(factory),
            Arc::clone(&chain) as Arc<dyn ChainProvider>,
            start_utc,
            end_utc,
        ));

        for symbol in equities {
            subscribe_equity(&data_manager, &symbol, &config)
                .with_context(|| format!("Failed to subscribe {}", symbol))?;
        }

        if let Some(canonical) = canonical {
            info!(symbol = %canonical, "Initializing continuous contract universe...");
            let security = data_manager.security(&canonical);
            let settings =
                UniverseSettings { resolution: config.replay.resolution, ..Default::default() };
            let universe = ContinuousContractUniverse::new(
                security,
                settings,
                Arc::clone(&chain) as Arc<dyn ChainProvider>,
            );
            data_manager
                .add_universe(Arc::new(universe))
                .context("Failed to add the continuous contract universe")?;
        }

        info!(
            subscriptions = data_manager.subscription_count(),
            "Service components initialized successfully"
        );

        Ok(Self {
            config,
            data_manager,
            handle: Arc::new(StrategyHandle::new()),
            isolator: Isolator::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Status handle observable while the loop runs.
    pub fn handle(&self) -> Arc<StrategyHandle> {
        Arc::clone(&self.handle)
    }

    pub fn data_manager(&self) -> Arc<DataManager> {
        Arc::clone(&self.data_manager)
    }

    /// Request cooperative shutdown of the running loop.
    pub fn stop(&self) {
        info!("Stop requested");
        self.shutdown.store(true, Ordering::Relaxed);
        self.isolator.cancel();
    }

    /// Drive `strategy` over the whole sequence, bounded by the configured
    /// wall-clock limit and slice ceiling.
    pub fn run<S: Strategy + 'static>(&self, mut strategy: S) -> Result<RunSummary> {
        let limit = Duration::from_secs(self.config.service.run_limit_secs);
        let slices_seen = Arc::new(AtomicU64::new(0));
        let budget = (self.config.service.max_slices > 0).then(|| {
            let counter = Arc::clone(&slices_seen);
            ResourceBudget::new("slices", self.config.service.max_slices, move || {
                counter.load(Ordering::Relaxed)
            })
        });

        let data_manager = Arc::clone(&self.data_manager);
        let handle = Arc::clone(&self.handle);
        let shutdown = Arc::clone(&self.shutdown);
        let counter = Arc::clone(&slices_seen);
        let sync_config = self.config.synchronizer.clone();

        info!(
            strategy = strategy.name(),
            mode = ?sync_config.mode,
            limit_secs = limit.as_secs(),
            "Starting strategy loop..."
        );

        let summary = self
            .isolator
            .execute(limit, budget, move |token| {
                let time_provider: Arc<dyn TimeProvider> = match sync_config.mode {
                    SyncMode::Backtest => data_manager.frontier_time_provider(),
                    SyncMode::Live => Arc::new(RealTimeProvider),
                };
                let mut sequence = Synchronizer::new(
                    data_manager,
                    time_provider,
                    &sync_config,
                    Arc::clone(&handle),
                    token,
                );

                let mut points = 0u64;
                let mut final_time = None;
                while !shutdown.load(Ordering::Relaxed) {
                    let Some(slice) = sequence.next() else { break };
                    counter.fetch_add(1, Ordering::Relaxed);
                    points += slice.count() as u64;
                    final_time = Some(slice.time());
                    if !slice.security_changes().is_empty() {
                        strategy.on_securities_changed(slice.security_changes());
                    }
                    strategy.on_data(&slice);
                }
                drop(sequence);

                let summary = RunSummary {
                    status: handle.status(),
                    error: handle.error_message(),
                    slices: counter.load(Ordering::Relaxed),
                    points,
                    final_time,
                };
                strategy.on_end(&summary);
                summary
            })
            .context("Strategy loop did not finish within its limits")?;

        info!(
            status = ?summary.status,
            slices = summary.slices,
            points = summary.points,
            "Strategy loop finished"
        );
        Ok(summary)
    }
}

fn subscribe_equity(
    data_manager: &Arc<DataManager>,
    symbol: &Symbol,
    config: &ServiceConfig,
) -> Result<()> {
    let security = data_manager.security(symbol);
    let configs = data_manager.add(
        symbol.clone(),
        config.replay.resolution,
        true,
        false,
        NormalizationMode::default(),
        false,
    );
    for data_config in configs {
        let request = SubscriptionRequest::for_security(
            None,
            Arc::clone(&security),
            data_config,
            data_manager.start_utc(),
            data_manager.end_utc(),
        );
        data_manager.add_subscription(request)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplayConfig;
    use crate::strategy::LoggingStrategy;
    use chrono::NaiveDate;
    use market_data::Resolution;

    fn small_config(future_root: Option<&str>) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.replay = ReplayConfig {
            start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            trading_days: 2,
            resolution: Resolution::Minute,
            bars_per_day: 5,
            equities: vec!["SPY".to_string(), "AAPL".to_string()],
            future_root: future_root.map(String::from),
        };
        config
    }

    #[test]
    fn a_replay_run_completes_and_counts_every_bar() {
        let service = ServiceState::new(small_config(None)).unwrap();
        let summary = service.run(LoggingStrategy::new("demo")).unwrap();

        assert_eq!(summary.status, StrategyStatus::Completed);
        assert_eq!(summary.error, None);
        // Two symbols, two sessions, five bars each.
        assert_eq!(summary.points, 20);
        assert!(summary.slices > 0);
        assert!(summary.final_time.is_some());
        assert_eq!(service.data_manager().subscription_count(), 0);
    }

    #[test]
    fn a_futures_scenario_wires_the_continuous_universe() {
        let service = ServiceState::new(small_config(Some("ES"))).unwrap();
        assert_eq!(service.data_manager().universes().len(), 1);

        let summary = service.run(LoggingStrategy::new("demo")).unwrap();
        assert_eq!(summary.status, StrategyStatus::Completed);
        // Equity bars plus the mapped contract and its canonical mirror.
        assert!(summary.points > 20);
    }

    #[test]
    fn stopping_before_the_run_ends_it_at_the_first_pull() {
        let service = ServiceState::new(small_config(None)).unwrap();
        service.stop();
        let summary = service.run(LoggingStrategy::new("demo")).unwrap();

        assert_eq!(summary.status, StrategyStatus::Stopped);
        assert_eq!(summary.slices, 0);
    }
}
