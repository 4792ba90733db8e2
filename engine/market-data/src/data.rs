//! Decoded market data points.
//!
//! A point's *emit time* is when it becomes visible to consumers: bars emit
//! when they close (start plus resolution period), ticks emit at their own
//! timestamp. The synchronizer orders everything by emit time.

use crate::subscription::{DataKind, Resolution};
use crate::symbol::Symbol;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Single trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
}

/// Trade bar spanning one resolution period starting at `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeBar {
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub resolution: Resolution,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl TradeBar {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.time + self.resolution.period()
    }
}

/// Top-of-book quote bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteBar {
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub resolution: Resolution,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
}

impl QuoteBar {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.time + self.resolution.period()
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// One row of a membership feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub symbol: Symbol,
    pub weight: Option<f64>,
    pub shares_held: Option<f64>,
    pub market_value: Option<f64>,
    pub last_update: Option<NaiveDate>,
}

/// Daily membership snapshot delivered on a universe's own subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentList {
    /// The universe symbol the snapshot belongs to, not a tradable instrument.
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub rows: Vec<Constituent>,
}

impl ConstituentList {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.time + chrono::Duration::days(1)
    }
}

/// Any decoded data point flowing through a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketData {
    Tick(Tick),
    TradeBar(TradeBar),
    QuoteBar(QuoteBar),
    Constituents(ConstituentList),
}

impl MarketData {
    pub fn symbol(&self) -> &Symbol {
        match self {
            MarketData::Tick(t) => &t.symbol,
            MarketData::TradeBar(b) => &b.symbol,
            MarketData::QuoteBar(q) => &q.symbol,
            MarketData::Constituents(c) => &c.symbol,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        match self {
            MarketData::Tick(t) => t.time,
            MarketData::TradeBar(b) => b.time,
            MarketData::QuoteBar(q) => q.time,
            MarketData::Constituents(c) => c.time,
        }
    }

    /// When this point becomes visible to consumers.
    pub fn end_time(&self) -> DateTime<Utc> {
        match self {
            MarketData::Tick(t) => t.time,
            MarketData::TradeBar(b) => b.end_time(),
            MarketData::QuoteBar(q) => q.end_time(),
            MarketData::Constituents(c) => c.end_time(),
        }
    }

    pub fn kind(&self) -> DataKind {
        match self {
            MarketData::Tick(_) => DataKind::Tick,
            MarketData::TradeBar(_) => DataKind::TradeBar,
            MarketData::QuoteBar(_) => DataKind::QuoteBar,
            MarketData::Constituents(_) => DataKind::Constituents,
        }
    }

    /// Representative price: last trade, bar close, or quote mid.
    pub fn price(&self) -> f64 {
        match self {
            MarketData::Tick(t) => t.price,
            MarketData::TradeBar(b) => b.close,
            MarketData::QuoteBar(q) => q.mid(),
            MarketData::Constituents(_) => 0.0,
        }
    }

    /// Clone of this point retagged with another symbol. Used to surface a
    /// contract's updates under its canonical continuous symbol.
    pub fn with_symbol(&self, symbol: Symbol) -> MarketData {
        let mut clone = self.clone();
        match &mut clone {
            MarketData::Tick(t) => t.symbol = symbol,
            MarketData::TradeBar(b) => b.symbol = symbol,
            MarketData::QuoteBar(q) => q.symbol = symbol,
            MarketData::Constituents(c) => c.symbol = symbol,
        }
        clone
    }
}
