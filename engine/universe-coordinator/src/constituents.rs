//! Externally-fed membership universe.

use chrono::{DateTime, Utc};
use market_data::{
    Constituent, DataKind, MarketData, Resolution, Security, Selection, SelectionError,
    SubscriptionDataConfig, Symbol, TickType, Universe, UniverseContext, UniverseSettings,
};
use std::sync::Arc;
use tracing::debug;

type RowFilter = dyn Fn(&[Constituent]) -> Vec<Symbol> + Send + Sync;

/// Universe whose membership is dictated by a constituent feed: each snapshot
/// arriving on the universe's own subscription replaces the member set.
///
/// Rows naming non-tradable symbols are skipped rather than failing the
/// cycle. An optional row filter narrows the snapshot, defaulting to "every
/// tradable row".
pub struct ConstituentUniverse {
    context: UniverseContext,
    filter: Option<Box<RowFilter>>,
}

impl ConstituentUniverse {
    /// `symbol` identifies the membership feed itself, e.g. a custom symbol
    /// derived from the index or fund being tracked.
    pub fn new(symbol: Symbol, settings: UniverseSettings) -> Self {
        let config = Arc::new(
            SubscriptionDataConfig::new(symbol, Resolution::Daily, TickType::Trade)
                .with_data_kind(DataKind::Constituents)
                .with_internal_feed(true),
        );
        Self { context: UniverseContext::new(config, settings), filter: None }
    }

    /// Narrow each snapshot with a caller-supplied row filter, e.g. by
    /// weight.
    pub fn with_filter(
        mut self,
        filter: impl Fn(&[Constituent]) -> Vec<Symbol> + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }
}

impl Universe for ConstituentUniverse {
    fn config(&self) -> Arc<SubscriptionDataConfig> {
        self.context.config()
    }

    fn settings(&self) -> &UniverseSettings {
        self.context.settings()
    }

    fn select_symbols(
        &self,
        _utc_time: DateTime<Utc>,
        data: &[MarketData],
    ) -> Result<Selection, SelectionError> {
        let mut rows: Vec<Constituent> = Vec::new();
        for point in data {
            if let MarketData::Constituents(list) = point {
                rows.extend(list.rows.iter().cloned());
            }
        }
        if rows.is_empty() {
            return Ok(Selection::Unchanged);
        }

        let tradable: Vec<Constituent> = rows
            .into_iter()
            .filter(|row| {
                let keep = !matches!(row.symbol.kind(), market_data::SecurityKind::Custom);
                if !keep {
                    debug!(symbol = %row.symbol, "skipping non-tradable constituent row");
                }
                keep
            })
            .collect();

        let symbols = match &self.filter {
            Some(filter) => filter(&tradable),
            None => tradable.into_iter().map(|row| row.symbol).collect(),
        };
        Ok(Selection::Changed(symbols))
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
