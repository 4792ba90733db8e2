//! Subscription identity and requests.

use crate::security::Security;
use crate::symbol::Symbol;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Sampling cadence of a data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// Span of one data point. Ticks are instantaneous.
    pub fn period(&self) -> chrono::Duration {
        match self {
            Resolution::Tick => chrono::Duration::zero(),
            Resolution::Second => chrono::Duration::seconds(1),
            Resolution::Minute => chrono::Duration::minutes(1),
            Resolution::Hour => chrono::Duration::hours(1),
            Resolution::Daily => chrono::Duration::days(1),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resolution::Tick => "tick",
            Resolution::Second => "second",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Daily => "daily",
        };
        write!(f, "{name}")
    }
}

/// Which side of the market a stream reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickType {
    Trade,
    Quote,
    OpenInterest,
}

/// Declared shape of the decoded points a stream yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Tick,
    TradeBar,
    QuoteBar,
    Constituents,
}

impl DataKind {
    /// Default shape for a (resolution, tick type) pair: tick resolution
    /// yields raw ticks, anything coarser yields bars.
    pub fn for_stream(resolution: Resolution, tick_type: TickType) -> DataKind {
        match (resolution, tick_type) {
            (Resolution::Tick, _) => DataKind::Tick,
            (_, TickType::Quote) => DataKind::QuoteBar,
            _ => DataKind::TradeBar,
        }
    }
}

/// Price adjustment applied by the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NormalizationMode {
    Raw,
    #[default]
    Adjusted,
    TotalReturn,
}

/// Identity of one logical data stream.
///
/// Immutable once created, with one exception: the *mapped symbol* names the
/// physical contract currently backing a canonical symbol and is updated in
/// place when the contract rolls. It is excluded from equality and hashing;
/// identity is (symbol, data kind, tick type, resolution, internal flag).
#[derive(Debug)]
pub struct SubscriptionDataConfig {
    pub symbol: Symbol,
    pub data_kind: DataKind,
    pub tick_type: TickType,
    pub resolution: Resolution,
    pub data_time_zone: Tz,
    pub exchange_time_zone: Tz,
    pub fill_forward: bool,
    pub extended_market_hours: bool,
    /// Internal feeds drive securities and universes but never reach user
    /// callbacks.
    pub internal_feed: bool,
    pub normalization: NormalizationMode,
    mapped_symbol: RwLock<Symbol>,
}

impl SubscriptionDataConfig {
    pub fn new(symbol: Symbol, resolution: Resolution, tick_type: TickType) -> Self {
        let data_kind = DataKind::for_stream(resolution, tick_type);
        let exchange_time_zone = symbol.market().time_zone();
        let mapped_symbol = RwLock::new(symbol.clone());
        Self {
            symbol,
            data_kind,
            tick_type,
            resolution,
            data_time_zone: chrono_tz::UTC,
            exchange_time_zone,
            fill_forward: true,
            extended_market_hours: false,
            internal_feed: false,
            normalization: NormalizationMode::default(),
            mapped_symbol,
        }
    }

    pub fn with_data_kind(mut self, data_kind: DataKind) -> Self {
        self.data_kind = data_kind;
        self
    }

    pub fn with_time_zones(mut self, data: Tz, exchange: Tz) -> Self {
        self.data_time_zone = data;
        self.exchange_time_zone = exchange;
        self
    }

    pub fn with_fill_forward(mut self, fill_forward: bool) -> Self {
        self.fill_forward = fill_forward;
        self
    }

    pub fn with_extended_market_hours(mut self, extended: bool) -> Self {
        self.extended_market_hours = extended;
        self
    }

    pub fn with_internal_feed(mut self, internal: bool) -> Self {
        self.internal_feed = internal;
        self
    }

    pub fn with_normalization(mut self, mode: NormalizationMode) -> Self {
        self.normalization = mode;
        self
    }

    /// Physical contract currently backing this stream's symbol. Equal to
    /// the symbol itself until a mapping provider rolls it.
    pub fn mapped_symbol(&self) -> Symbol {
        self.mapped_symbol.read().clone()
    }

    pub fn set_mapped_symbol(&self, symbol: Symbol) {
        *self.mapped_symbol.write() = symbol;
    }

    /// Exchange-local wall time for a UTC instant.
    pub fn local_time(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.exchange_time_zone).naive_local()
    }

    /// Exchange-local calendar date for a UTC instant.
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        self.local_time(utc).date()
    }
}

impl Clone for SubscriptionDataConfig {
    fn clone(&self) -> Self {
        Self {
            symbol: self.symbol.clone(),
            data_kind: self.data_kind,
            tick_type: self.tick_type,
            resolution: self.resolution,
            data_time_zone: self.data_time_zone,
            exchange_time_zone: self.exchange_time_zone,
            fill_forward: self.fill_forward,
            extended_market_hours: self.extended_market_hours,
            internal_feed: self.internal_feed,
            normalization: self.normalization,
            mapped_symbol: RwLock::new(self.mapped_symbol.read().clone()),
        }
    }
}

impl PartialEq for SubscriptionDataConfig {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.data_kind == other.data_kind
            && self.tick_type == other.tick_type
            && self.resolution == other.resolution
            && self.internal_feed == other.internal_feed
    }
}

impl Eq for SubscriptionDataConfig {}

impl Hash for SubscriptionDataConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.data_kind.hash(state);
        self.tick_type.hash(state);
        self.resolution.hash(state);
        self.internal_feed.hash(state);
    }
}

impl fmt::Display for SubscriptionDataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:?}", self.symbol, self.resolution, self.tick_type)?;
        if self.internal_feed {
            write!(f, " (internal)")?;
        }
        Ok(())
    }
}

/// Request to open one subscription, accepted or rejected by the data manager.
#[derive(Clone)]
pub struct SubscriptionRequest {
    /// Symbol of the universe that owns this subscription, `None` for
    /// directly added securities.
    pub universe: Option<Symbol>,
    /// True for a universe's own selection-data stream.
    pub is_universe_subscription: bool,
    pub security: Arc<Security>,
    pub config: Arc<SubscriptionDataConfig>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl SubscriptionRequest {
    /// Request for a security's data stream, owned by `universe` when the
    /// stream exists because that universe selected the security.
    pub fn for_security(
        universe: Option<Symbol>,
        security: Arc<Security>,
        config: Arc<SubscriptionDataConfig>,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Self {
        Self { universe, is_universe_subscription: false, security, config, start_utc, end_utc }
    }

    /// Request for a universe's own selection-data stream.
    pub fn for_universe(
        universe: Symbol,
        security: Arc<Security>,
        config: Arc<SubscriptionDataConfig>,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            universe: Some(universe),
            is_universe_subscription: true,
            security,
            config,
            start_utc,
            end_utc,
        }
    }
}

impl fmt::Debug for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRequest")
            .field("config", &self.config.to_string())
            .field("universe", &self.universe)
            .field("is_universe_subscription", &self.is_universe_subscription)
            .finish()
    }
}

/// Creates or returns the subscription configs a symbol should stream under
/// the given settings. Implemented by the data manager; universes call it
/// when translating a selection into subscription requests.
pub trait SubscriptionConfigService: Send + Sync {
    fn add(
        &self,
        symbol: Symbol,
        resolution: Resolution,
        fill_forward: bool,
        extended_market_hours: bool,
        normalization: NormalizationMode,
        internal_feed: bool,
    ) -> Vec<Arc<SubscriptionDataConfig>>;
}
