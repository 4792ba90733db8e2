//! Deterministic synthetic market data for replay runs.
//!
//! Streams are generated from a congruential walk seeded by the symbol text,
//! so two runs over the same configuration replay identical bars. Futures
//! products get one stream per quarterly contract plus a static chain the
//! continuous universe rolls through.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use std::sync::Arc;
use tracing::debug;

use feed_synchronizer::ReplayDataFactory;
use market_data::{ExchangeHours, Market, MarketData, Resolution, Symbol, TradeBar};
use universe_coordinator::{StaticChainProvider, ROLL_MAX_EXPIRY_DAYS};

use crate::config::ReplayConfig;

/// Everything a run needs from the generator: recorded streams, the contract
/// chain, and the instruments to subscribe.
pub struct ReplayScenario {
    pub factory: ReplayDataFactory,
    pub chain: Arc<StaticChainProvider>,
    pub equities: Vec<Symbol>,
    pub canonical: Option<Symbol>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

/// Generate the streams and chain described by `config`.
pub fn build_scenario(config: &ReplayConfig) -> ReplayScenario {
    let calendar = ExchangeHours::new(Market::Usa.time_zone());
    let sessions = session_dates(&calendar, config.start, config.trading_days);
    let last = sessions.last().copied().unwrap_or(config.start);

    let mut factory = ReplayDataFactory::new();

    let mut equities = Vec::new();
    for root in &config.equities {
        let symbol = Symbol::equity(root.to_uppercase(), Market::Usa);
        let bars = session_bars(&symbol, &sessions, config.resolution, config.bars_per_day);
        debug!(symbol = %symbol, bars = bars.len(), "generated equity stream");
        factory.add_stream(symbol.clone(), bars);
        equities.push(symbol);
    }

    let chain = Arc::new(StaticChainProvider::new());
    let canonical = config.future_root.as_ref().map(|root| {
        let root = root.to_uppercase();
        let canonical = Symbol::canonical_future(root.clone(), Market::Cme);
        let contracts: Vec<Symbol> = quarterly_expiries(config.start, last)
            .into_iter()
            .map(|expiry| Symbol::future_contract(root.clone(), Market::Cme, expiry))
            .collect();
        for contract in &contracts {
            let bars = session_bars(contract, &sessions, config.resolution, config.bars_per_day);
            debug!(symbol = %contract, bars = bars.len(), "generated contract stream");
            factory.add_stream(contract.clone(), bars);
        }
        chain.set_chain(canonical.clone(), contracts);
        canonical
    });

    ReplayScenario {
        factory,
        chain,
        equities,
        canonical,
        start_utc: day_start_utc(config.start),
        end_utc: day_start_utc(last + Duration::days(1)),
    }
}

/// Bars for one symbol across the given session dates, opening 09:30
/// exchange-local each day.
pub fn session_bars(
    symbol: &Symbol,
    sessions: &[NaiveDate],
    resolution: Resolution,
    bars_per_day: u32,
) -> Vec<MarketData> {
    let tz = symbol.market().time_zone();
    let period = resolution.period();
    let mut walk = PriceWalk::seeded(&symbol.to_string());
    let mut bars = Vec::with_capacity(sessions.len() * bars_per_day as usize);
    for &date in sessions {
        let Some(open_utc) = session_open_utc(tz, date) else { continue };
        for i in 0..bars_per_day {
            let time = open_utc + period * i as i32;
            bars.push(MarketData::TradeBar(walk.bar(symbol.clone(), time, resolution)));
        }
    }
    bars
}

/// First `count` trading days starting at `from`.
fn session_dates(calendar: &ExchangeHours, from: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let horizon = from + Duration::days(2 * i64::from(count) + 14);
    calendar.trading_days(from, horizon).take(count as usize).collect()
}

fn session_open_utc(tz: chrono_tz::Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    let open = date.and_hms_opt(9, 30, 0)?;
    open.and_local_timezone(tz).single().map(|local| local.with_timezone(&Utc))
}

fn day_start_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Standard quarterly expirations (third Friday of Mar/Jun/Sep/Dec) covering
/// the replay window plus the roll lookahead, so the front-month search
/// always has a candidate.
fn quarterly_expiries(start: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let horizon = last + Duration::days(ROLL_MAX_EXPIRY_DAYS + 90);
    let mut expiries = Vec::new();
    let mut year = start.year();
    while year <= horizon.year() {
        for month in [3, 6, 9, 12] {
            if let Some(expiry) = third_friday(year, month) {
                if expiry >= start && expiry <= horizon {
                    expiries.push(expiry);
                }
            }
        }
        year += 1;
    }
    expiries
}

fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let to_friday = (Weekday::Fri.num_days_from_monday() + 7
        - first.weekday().num_days_from_monday())
        % 7;
    Some(first + Duration::days(i64::from(to_friday) + 14))
}

/// Congruential walk driving small steps around a per-symbol base price.
struct PriceWalk {
    state: u64,
    price: f64,
}

impl PriceWalk {
    fn seeded(text: &str) -> Self {
        let mut state = 0xcbf2_9ce4_8422_2325u64;
        for byte in text.bytes() {
            state = (state ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3);
        }
        let price = 40.0 + (state % 4_600) as f64 / 10.0;
        Self { state, price }
    }

    fn next_unit(&mut self) -> f64 {
        self.state =
            self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.state >> 11) as f64 / (1u64 << 53) as f64
    }

    fn bar(&mut self, symbol: Symbol, time: DateTime<Utc>, resolution: Resolution) -> TradeBar {
        let open = self.price;
        let close = open * (1.0 + (self.next_unit() - 0.5) * 0.004);
        let spread = open * self.next_unit() * 0.001;
        let high = open.max(close) + spread;
        let low = open.min(close) - spread;
        let volume = (1_000.0 + self.next_unit() * 9_000.0).round();
        self.price = close;
        TradeBar { symbol, time, resolution, open, high, low, close, volume }
    }
}
