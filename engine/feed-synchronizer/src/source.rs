//! Data sources behind subscriptions.

use crate::error::FeedError;
use chrono::{DateTime, Utc};
use market_data::{MarketData, SubscriptionRequest, Symbol, Tick};
use std::collections::{HashMap, VecDeque};

/// Outcome of polling a source for its next point.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPoll {
    /// The next point in end-time order.
    Ready(MarketData),
    /// Nothing available right now; more may arrive later.
    Pending,
    /// The stream is exhausted and will never produce again.
    Done,
}

/// A single subscription's stream of points, ordered by end time.
pub trait DataSource: Send {
    fn poll(&mut self) -> Result<FeedPoll, FeedError>;
}

/// Creates the source for a subscription request. Live feeds, disk readers
/// and replay fixtures all sit behind this seam.
pub trait DataSourceFactory: Send + Sync {
    fn create(&self, request: &SubscriptionRequest) -> Result<Box<dyn DataSource>, FeedError>;
}

/// In-memory source that drains a pre-built sequence of points.
pub struct VecDataSource {
    points: VecDeque<MarketData>,
}

impl VecDataSource {
    pub fn new(points: impl IntoIterator<Item = MarketData>) -> Self {
        Self { points: points.into_iter().collect() }
    }

    pub fn empty() -> Self {
        Self { points: VecDeque::new() }
    }
}

impl DataSource for VecDataSource {
    fn poll(&mut self) -> Result<FeedPoll, FeedError> {
        match self.points.pop_front() {
            Some(point) => Ok(FeedPoll::Ready(point)),
            None => Ok(FeedPoll::Done),
        }
    }
}

/// Synthetic stream of zero-sized ticks at fixed instants. Backs the
/// selection stream of time-triggered universes, so the frontier stops at
/// every scheduled selection instant even when no market data lands there.
pub struct ScheduleSource {
    symbol: Symbol,
    times: VecDeque<DateTime<Utc>>,
}

impl ScheduleSource {
    pub fn new(symbol: Symbol, times: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        Self { symbol, times: times.into_iter().collect() }
    }
}

impl DataSource for ScheduleSource {
    fn poll(&mut self) -> Result<FeedPoll, FeedError> {
        match self.times.pop_front() {
            Some(time) => Ok(FeedPoll::Ready(MarketData::Tick(Tick {
                symbol: self.symbol.clone(),
                time,
                price: 0.0,
                size: 0.0,
            }))),
            None => Ok(FeedPoll::Done),
        }
    }
}

/// Factory serving recorded streams keyed by symbol.
///
/// Canonical configs resolve through their current mapped contract, so a
/// rebound subscription picks up the new contract's recording. Points whose
/// kind differs from the config's declared kind are filtered out, letting one
/// recording per symbol back both trade and quote configs.
#[derive(Default)]
pub struct ReplayDataFactory {
    streams: HashMap<Symbol, Vec<MarketData>>,
}

impl ReplayDataFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the recording for one symbol, replacing any previous one.
    pub fn add_stream(&mut self, symbol: Symbol, points: Vec<MarketData>) {
        self.streams.insert(symbol, points);
    }

    pub fn with_stream(mut self, symbol: Symbol, points: Vec<MarketData>) -> Self {
        self.add_stream(symbol, points);
        self
    }
}

impl DataSourceFactory for ReplayDataFactory {
    fn create(&self, request: &SubscriptionRequest) -> Result<Box<dyn DataSource>, FeedError> {
        let config = &request.config;
        let key = if config.symbol.is_canonical() {
            config.mapped_symbol()
        } else {
            config.symbol.clone()
        };
        let points = self
            .streams
            .get(&key)
            .map(|points| {
                points
                    .iter()
                    .filter(|point| point.kind() == config.data_kind)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(Box::new(VecDataSource::new(points)))
    }
}
