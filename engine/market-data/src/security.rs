//! Runtime security state and exchange trading calendars.

use crate::data::MarketData;
use crate::symbol::Symbol;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Trading calendar for one exchange: a time zone plus holiday closures.
/// Trading days are weekdays not marked as holidays.
#[derive(Debug, Clone)]
pub struct ExchangeHours {
    time_zone: Tz,
    holidays: HashSet<NaiveDate>,
}

impl ExchangeHours {
    pub fn new(time_zone: Tz) -> Self {
        Self { time_zone, holidays: HashSet::new() }
    }

    pub fn with_holidays(time_zone: Tz, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self { time_zone, holidays: holidays.into_iter().collect() }
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Trading days in `[from, until]`, ascending.
    pub fn trading_days(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> impl Iterator<Item = NaiveDate> + '_ {
        let mut current = from;
        std::iter::from_fn(move || {
            while current <= until {
                let date = current;
                current += Duration::days(1);
                if self.is_trading_day(date) {
                    return Some(date);
                }
            }
            None
        })
    }

    /// Exchange-local calendar date of a UTC instant.
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.time_zone).date_naive()
    }

    pub fn local_time(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.time_zone).naive_local()
    }
}

/// Runtime state of one instrument: latest applied data point and, for a
/// canonical continuous instrument, the concrete contract security currently
/// backing it.
pub struct Security {
    symbol: Symbol,
    exchange: ExchangeHours,
    last: RwLock<Option<MarketData>>,
    underlying: RwLock<Option<Arc<Security>>>,
}

impl Security {
    pub fn new(symbol: Symbol, exchange: ExchangeHours) -> Self {
        Self { symbol, exchange, last: RwLock::new(None), underlying: RwLock::new(None) }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn exchange(&self) -> &ExchangeHours {
        &self.exchange
    }

    /// Record the latest data point applied to this security.
    pub fn update(&self, data: &MarketData) {
        *self.last.write() = Some(data.clone());
    }

    pub fn last_data(&self) -> Option<MarketData> {
        self.last.read().clone()
    }

    /// Latest known price, 0.0 before any data arrives.
    pub fn price(&self) -> f64 {
        self.last.read().as_ref().map(MarketData::price).unwrap_or(0.0)
    }

    pub fn has_data(&self) -> bool {
        self.last.read().is_some()
    }

    /// Concrete contract security backing this canonical instrument.
    pub fn underlying(&self) -> Option<Arc<Security>> {
        self.underlying.read().clone()
    }

    pub fn set_underlying(&self, security: Arc<Security>) {
        *self.underlying.write() = Some(security);
    }
}

impl fmt::Debug for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Security")
            .field("symbol", &self.symbol.to_string())
            .field("price", &self.price())
            .field(
                "underlying",
                &self.underlying.read().as_ref().map(|u| u.symbol().to_string()),
            )
            .finish()
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Tick;
    use crate::symbol::Market;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn trading_days_skip_weekends_and_holidays() {
        // 2024-03-29 is Good Friday; 03-30/31 are the weekend.
        let hours =
            ExchangeHours::with_holidays(chrono_tz::America::Chicago, [d(2024, 3, 29)]);
        let days: Vec<NaiveDate> = hours.trading_days(d(2024, 3, 27), d(2024, 4, 2)).collect();
        assert_eq!(days, vec![d(2024, 3, 27), d(2024, 3, 28), d(2024, 4, 1), d(2024, 4, 2)]);
    }

    #[test]
    fn local_date_crosses_midnight() {
        let hours = ExchangeHours::new(chrono_tz::America::Chicago);
        // 02:00 UTC is still the previous evening in Chicago.
        let utc = Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap();
        assert_eq!(hours.local_date(utc), d(2024, 3, 1));
    }

    #[test]
    fn security_tracks_latest_price() {
        let security = Security::new(
            Symbol::equity("SPY", Market::Usa),
            ExchangeHours::new(chrono_tz::America::New_York),
        );
        assert_eq!(security.price(), 0.0);
        assert!(!security.has_data());

        security.update(&MarketData::Tick(Tick {
            symbol: security.symbol().clone(),
            time: Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
            price: 510.25,
            size: 100.0,
        }));
        assert_eq!(security.price(), 510.25);
        assert!(security.has_data());
    }

    #[test]
    fn underlying_rebinds() {
        let canonical = Security::new(
            Symbol::canonical_future("ES", Market::Cme),
            ExchangeHours::new(chrono_tz::America::Chicago),
        );
        assert!(canonical.underlying().is_none());

        let march = Arc::new(Security::new(
            Symbol::future_contract("ES", Market::Cme, d(2024, 3, 15)),
            ExchangeHours::new(chrono_tz::America::Chicago),
        ));
        canonical.set_underlying(Arc::clone(&march));
        assert_eq!(canonical.underlying().unwrap().symbol(), march.symbol());
    }
}
