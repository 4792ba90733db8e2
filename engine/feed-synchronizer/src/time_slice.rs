//! One synchronized step of the combined feed.

use chrono::{DateTime, Utc};
use market_data::{MarketData, SecurityChanges, Symbol};
use std::fmt;

/// Everything that became visible at one frontier instant: the data points of
/// every subscription with something pending, plus the security delta from
/// any selections applied this step.
pub struct TimeSlice {
    time: DateTime<Utc>,
    data: Vec<MarketData>,
    security_changes: SecurityChanges,
}

impl TimeSlice {
    pub fn new(time: DateTime<Utc>, data: Vec<MarketData>, security_changes: SecurityChanges) -> Self {
        Self { time, data, security_changes }
    }

    /// Frontier instant this slice was assembled at.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn data(&self) -> &[MarketData] {
        &self.data
    }

    pub fn security_changes(&self) -> &SecurityChanges {
        &self.security_changes
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.security_changes.is_empty()
    }

    /// Points in this slice tagged with `symbol`.
    pub fn data_for<'a>(&'a self, symbol: &'a Symbol) -> impl Iterator<Item = &'a MarketData> {
        self.data.iter().filter(move |point| point.symbol() == symbol)
    }
}

impl fmt::Debug for TimeSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSlice")
            .field("time", &self.time)
            .field("points", &self.data.len())
            .field("changes", &self.security_changes.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use market_data::{Market, Resolution, Tick, TradeBar};

    #[test]
    fn data_for_filters_by_symbol() {
        let spy = Symbol::equity("SPY", Market::Usa);
        let aapl = Symbol::equity("AAPL", Market::Usa);
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        let slice = TimeSlice::new(
            time,
            vec![
                MarketData::Tick(Tick { symbol: spy.clone(), time, price: 500.0, size: 10.0 }),
                MarketData::TradeBar(TradeBar {
                    symbol: aapl.clone(),
                    time,
                    resolution: Resolution::Minute,
                    open: 170.0,
                    high: 171.0,
                    low: 169.5,
                    close: 170.5,
                    volume: 900.0,
                }),
            ],
            SecurityChanges::none(),
        );

        assert_eq!(slice.count(), 2);
        assert_eq!(slice.data_for(&spy).count(), 1);
        assert_eq!(slice.data_for(&aapl).count(), 1);
        assert!(!slice.is_empty());
    }

    #[test]
    fn empty_means_no_data_and_no_changes() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let slice = TimeSlice::new(time, Vec::new(), SecurityChanges::none());
        assert!(slice.is_empty());
        assert_eq!(slice.count(), 0);
    }
}
