//! Strategy surface driven by the synchronized sequence.

use std::collections::HashMap;
use tracing::{info, trace};

use feed_synchronizer::TimeSlice;
use market_data::{SecurityChanges, Symbol};

use crate::service::RunSummary;

/// Consumer of the slice sequence. Calls arrive on the run thread in slice
/// order: membership changes first, then the slice itself.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Universe membership changed in the slice about to be delivered.
    fn on_securities_changed(&mut self, _changes: &SecurityChanges) {}

    /// One synchronized slice.
    fn on_data(&mut self, slice: &TimeSlice);

    /// The sequence ended; called once with the run totals.
    fn on_end(&mut self, _summary: &RunSummary) {}
}

/// Demo strategy: tracks last prices and point counts per symbol, logging
/// membership changes as they happen.
pub struct LoggingStrategy {
    name: String,
    points: HashMap<Symbol, u64>,
    last_price: HashMap<Symbol, f64>,
    slices: u64,
}

impl LoggingStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), points: HashMap::new(), last_price: HashMap::new(), slices: 0 }
    }

    pub fn slices(&self) -> u64 {
        self.slices
    }

    pub fn points(&self) -> u64 {
        self.points.values().sum()
    }

    pub fn last_price(&self, symbol: &Symbol) -> Option<f64> {
        self.last_price.get(symbol).copied()
    }

    /// Per-symbol point counts sorted by symbol text, for the end-of-run
    /// report.
    pub fn summary(&self) -> Vec<(String, u64)> {
        let mut rows: Vec<_> =
            self.points.iter().map(|(symbol, count)| (symbol.to_string(), *count)).collect();
        rows.sort();
        rows
    }
}

impl Strategy for LoggingStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_securities_changed(&mut self, changes: &SecurityChanges) {
        info!(strategy = self.name.as_str(), %changes, "universe membership changed");
    }

    fn on_data(&mut self, slice: &TimeSlice) {
        self.slices += 1;
        for point in slice.data() {
            *self.points.entry(point.symbol().clone()).or_insert(0) += 1;
            self.last_price.insert(point.symbol().clone(), point.price());
        }
        trace!(time = %slice.time(), points = slice.count(), "slice delivered");
    }

    fn on_end(&mut self, summary: &RunSummary) {
        info!(
            strategy = self.name.as_str(),
            status = ?summary.status,
            slices = self.slices,
            "run ended"
        );
        for (symbol, count) in self.summary() {
            info!(symbol = symbol.as_str(), points = count, "symbol total");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use market_data::{Market, MarketData, Resolution, Tick, TradeBar};

    #[test]
    fn counts_points_per_symbol() {
        let spy = Symbol::equity("SPY", Market::Usa);
        let aapl = Symbol::equity("AAPL", Market::Usa);
        let time = Utc.with_ymd_and_hms(2024, 3, 4, 14, 31, 0).unwrap();

        let mut strategy = LoggingStrategy::new("demo");
        strategy.on_data(&TimeSlice::new(
            time,
            vec![
                MarketData::Tick(Tick { symbol: spy.clone(), time, price: 510.0, size: 5.0 }),
                MarketData::TradeBar(TradeBar {
                    symbol: aapl.clone(),
                    time,
                    resolution: Resolution::Minute,
                    open: 170.0,
                    high: 171.0,
                    low: 169.0,
                    close: 170.5,
                    volume: 900.0,
                }),
            ],
            SecurityChanges::none(),
        ));
        strategy.on_data(&TimeSlice::new(
            time + chrono::Duration::minutes(1),
            vec![MarketData::Tick(Tick { symbol: spy.clone(), time, price: 511.0, size: 1.0 })],
            SecurityChanges::none(),
        ));

        assert_eq!(strategy.slices(), 2);
        assert_eq!(strategy.points(), 3);
        assert_eq!(strategy.last_price(&spy), Some(511.0));
        assert_eq!(strategy.last_price(&aapl), Some(170.5));
        assert_eq!(
            strategy.summary(),
            vec![("AAPL".to_string(), 1), ("SPY".to_string(), 2)]
        );
    }
}
