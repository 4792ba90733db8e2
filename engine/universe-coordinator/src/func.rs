//! Declarative universe driven by a caller-supplied selection function.

use chrono::{DateTime, Utc};
use market_data::{
    MarketData, Security, Selection, SelectionError, SubscriptionDataConfig, Symbol, Universe,
    UniverseContext, UniverseSettings,
};
use std::sync::Arc;

type SelectorFn =
    dyn Fn(DateTime<Utc>, &[MarketData]) -> Result<Selection, SelectionError> + Send + Sync;

/// Universe whose selection is an arbitrary function of the trigger time and
/// the selection data that arrived this step. Selector failures propagate;
/// unlike the chain-driven variants there is no graceful fallback.
pub struct FuncUniverse {
    context: UniverseContext,
    selector: Box<SelectorFn>,
    trigger_times: Option<Vec<DateTime<Utc>>>,
}

impl FuncUniverse {
    pub fn new(
        config: Arc<SubscriptionDataConfig>,
        settings: UniverseSettings,
        selector: impl Fn(DateTime<Utc>, &[MarketData]) -> Result<Selection, SelectionError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            context: UniverseContext::new(config, settings),
            selector: Box::new(selector),
            trigger_times: None,
        }
    }

    /// Drive selection at explicit instants instead of from arriving data.
    pub fn with_trigger_times(mut self, times: Vec<DateTime<Utc>>) -> Self {
        self.trigger_times = Some(times);
        self
    }
}

impl Universe for FuncUniverse {
    fn config(&self) -> Arc<SubscriptionDataConfig> {
        self.context.config()
    }

    fn settings(&self) -> &UniverseSettings {
        self.context.settings()
    }

    fn select_symbols(
        &self,
        utc_time: DateTime<Utc>,
        data: &[MarketData],
    ) -> Result<Selection, SelectionError> {
        (self.selector)(utc_time, data)
    }

    fn trigger_times(
        &self,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Option<Vec<DateTime<Utc>>> {
        self.trigger_times.as_ref().map(|times| {
            times.iter().copied().filter(|t| *t >= start_utc && *t <= end_utc).collect()
        })
    }

    fn last_selection_utc(&self) -> Option<DateTime<Utc>> {
        self.context.last_selection_utc()
    }

    fn record_selection(&self, utc_time: DateTime<Utc>) {
        self.context.record_selection(utc_time);
    }

    fn members(&self) -> Vec<Arc<Security>> {
        self.context.members()
    }

    fn contains(&self, symbol: &Symbol) -> bool {
        self.context.contains(symbol)
    }

    fn add_member(&self, security: Arc<Security>) {
        self.context.add_member(security);
    }

    fn remove_member(&self, symbol: &Symbol) -> Option<Arc<Security>> {
        self.context.remove_member(symbol)
    }
}
