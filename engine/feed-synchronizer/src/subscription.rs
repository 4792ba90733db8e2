//! One configured data stream and its pull cursor.

use crate::error::FeedError;
use crate::source::{DataSource, FeedPoll, VecDataSource};
use chrono::{DateTime, NaiveDate, Utc};
use market_data::{MarketData, Security, SubscriptionDataConfig, SubscriptionRequest, Symbol};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use universe_coordinator::TradableDateHandler;

struct Cursor {
    source: Box<dyn DataSource>,
    peeked: Option<MarketData>,
    finished: bool,
    failed: bool,
    /// Physical symbol the current source was created for. Differs from the
    /// config's mapped symbol once a continuous mapping has rolled, which is
    /// the signal to rebind.
    bound_symbol: Symbol,
    last_local_date: Option<NaiveDate>,
    /// End time of the most recently delivered point.
    last_emit: Option<DateTime<Utc>>,
    /// Points at or before this instant are dropped. Set on rebind so a
    /// rolled source cannot replay history the old source already covered.
    skip_until: Option<DateTime<Utc>>,
}

/// An active subscription: the request that created it, its data source, and
/// the cursor state the synchronizer advances each step.
///
/// Points are pulled strictly in end-time order. Points ending before the
/// request's start are dropped while filling, so a subscription added
/// mid-run can never pull the frontier backward.
pub struct Subscription {
    request: SubscriptionRequest,
    cursor: Mutex<Cursor>,
    handlers: RwLock<Vec<Arc<dyn TradableDateHandler>>>,
}

impl Subscription {
    pub fn new(request: SubscriptionRequest, source: Box<dyn DataSource>) -> Self {
        let bound_symbol = request.config.mapped_symbol();
        Self {
            request,
            cursor: Mutex::new(Cursor {
                source,
                peeked: None,
                finished: false,
                failed: false,
                bound_symbol,
                last_local_date: None,
                last_emit: None,
                skip_until: None,
            }),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Arc<SubscriptionDataConfig> {
        &self.request.config
    }

    pub fn security(&self) -> &Arc<Security> {
        &self.request.security
    }

    /// Universe that owns this stream, `None` for directly added securities.
    pub fn universe(&self) -> Option<&Symbol> {
        self.request.universe.as_ref()
    }

    pub fn is_universe_subscription(&self) -> bool {
        self.request.is_universe_subscription
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.request.start_utc
    }

    /// End time of the next pending point, `None` when nothing is buffered
    /// and the source has no point ready.
    pub fn next_emit_time(&self) -> Option<DateTime<Utc>> {
        let mut cursor = self.cursor.lock();
        self.fill(&mut cursor);
        cursor.peeked.as_ref().map(MarketData::end_time)
    }

    /// Drain every pending point with an end time at or before `frontier`.
    ///
    /// Tradable-date handlers fire before the first point of a new
    /// exchange-local trading day is surfaced, and canonical streams are
    /// retagged from the physical contract to the config's symbol. Each
    /// delivered point also updates the security's price cache.
    pub fn take_until(&self, frontier: DateTime<Utc>) -> Vec<MarketData> {
        let mut cursor = self.cursor.lock();
        let mut points = Vec::new();
        loop {
            self.fill(&mut cursor);
            match cursor.peeked.as_ref() {
                Some(peeked) if peeked.end_time() <= frontier => {}
                _ => break,
            }
            let point = match cursor.peeked.take() {
                Some(point) => point,
                None => break,
            };
            let emit = point.end_time();
            cursor.last_emit = Some(emit);

            let exchange = self.request.security.exchange();
            let date = exchange.local_date(emit);
            if cursor.last_local_date != Some(date) {
                cursor.last_local_date = Some(date);
                if exchange.is_trading_day(date) {
                    for handler in self.handlers.read().iter() {
                        handler.on_new_tradable_date(date, emit);
                    }
                }
            }

            let point = if point.symbol() != &self.request.config.symbol {
                point.with_symbol(self.request.config.symbol.clone())
            } else {
                point
            };
            if !self.request.is_universe_subscription {
                self.request.security.update(&point);
            }
            points.push(point);
        }
        points
    }

    fn fill(&self, cursor: &mut Cursor) {
        while cursor.peeked.is_none() && !cursor.finished && !cursor.failed {
            match cursor.source.poll() {
                Ok(FeedPoll::Ready(point)) => {
                    let end = point.end_time();
                    if end < self.request.start_utc {
                        continue;
                    }
                    if matches!(cursor.skip_until, Some(watermark) if end <= watermark) {
                        continue;
                    }
                    cursor.peeked = Some(point);
                }
                Ok(FeedPoll::Pending) => break,
                Ok(FeedPoll::Done) => cursor.finished = true,
                Err(err) => {
                    warn!(config = %self.request.config, error = %err, "data source failed");
                    cursor.failed = true;
                }
            }
        }
    }

    /// Swap in a fresh source after the config's mapping rolled to a new
    /// contract. Buffered state from the old contract is discarded, and the
    /// new source is fast-forwarded past everything the old one already
    /// delivered, so a roll can never replay history. The local-date
    /// watermark survives so the roll date itself is not re-announced.
    pub fn rebind(&self, source: Box<dyn DataSource>) {
        let mut cursor = self.cursor.lock();
        cursor.source = source;
        cursor.peeked = None;
        cursor.finished = false;
        cursor.failed = false;
        cursor.skip_until = cursor.last_emit;
        cursor.bound_symbol = self.request.config.mapped_symbol();
        debug!(config = %self.request.config, bound = %cursor.bound_symbol, "subscription rebound");
    }

    /// True once the config's mapped symbol moved past the contract the
    /// current source streams.
    pub fn needs_rebind(&self) -> bool {
        self.cursor.lock().bound_symbol != self.request.config.mapped_symbol()
    }

    pub fn bound_symbol(&self) -> Symbol {
        self.cursor.lock().bound_symbol.clone()
    }

    pub fn is_finished(&self) -> bool {
        let cursor = self.cursor.lock();
        cursor.finished && cursor.peeked.is_none()
    }

    pub fn is_failed(&self) -> bool {
        self.cursor.lock().failed
    }

    pub fn register_tradable_date_handler(&self, handler: Arc<dyn TradableDateHandler>) {
        self.handlers.write().push(handler);
    }

    /// Release the source and stop producing. Safe to call more than once.
    pub fn dispose(&self) {
        let mut cursor = self.cursor.lock();
        cursor.source = Box::new(VecDataSource::empty());
        cursor.peeked = None;
        cursor.finished = true;
        self.handlers.write().clear();
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request.config)
    }
}

/// Insertion-ordered set of active subscriptions, shared between the data
/// manager and the frontier time provider.
pub(crate) struct SubscriptionRegistry {
    entries: RwLock<Vec<Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }

    pub(crate) fn find(&self, config: &SubscriptionDataConfig) -> Option<Arc<Subscription>> {
        self.entries.read().iter().find(|s| s.config().as_ref() == config).cloned()
    }

    pub(crate) fn insert(&self, subscription: Arc<Subscription>) {
        self.entries.write().push(subscription);
    }

    pub(crate) fn remove(&self, config: &SubscriptionDataConfig) -> Option<Arc<Subscription>> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|s| s.config().as_ref() == config)?;
        Some(entries.remove(index))
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.entries.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn has_symbol(&self, symbol: &Symbol) -> bool {
        self.entries.read().iter().any(|s| s.config().symbol == *symbol)
    }

    /// Distinct tradable symbols with active streams. Canonical mirrors and
    /// internal feeds are excluded, matching what the subscription limit
    /// counts.
    pub(crate) fn active_symbol_count(&self) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|s| !s.config().internal_feed && !s.config().symbol.is_canonical())
            .map(|s| s.config().symbol.clone())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Earliest pending end time across every active subscription.
    pub(crate) fn min_next_emit_time(&self) -> Option<DateTime<Utc>> {
        self.snapshot().iter().filter_map(|s| s.next_emit_time()).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use market_data::{ExchangeHours, Market, Resolution, TickType, TradeBar};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedSource {
        steps: VecDeque<Result<FeedPoll, FeedError>>,
    }

    impl ScriptedSource {
        fn new(steps: impl IntoIterator<Item = Result<FeedPoll, FeedError>>) -> Self {
            Self { steps: steps.into_iter().collect() }
        }
    }

    impl DataSource for ScriptedSource {
        fn poll(&mut self) -> Result<FeedPoll, FeedError> {
            self.steps.pop_front().unwrap_or(Ok(FeedPoll::Done))
        }
    }

    struct RecordingHandler {
        dates: Mutex<Vec<NaiveDate>>,
    }

    impl TradableDateHandler for RecordingHandler {
        fn on_new_tradable_date(&self, date: NaiveDate, _utc_time: DateTime<Utc>) {
            self.dates.lock().push(date);
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn bar(symbol: &Symbol, time: DateTime<Utc>, close: f64) -> MarketData {
        MarketData::TradeBar(TradeBar {
            symbol: symbol.clone(),
            time,
            resolution: Resolution::Minute,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
    }

    fn equity_request(
        symbol: &Symbol,
        start: DateTime<Utc>,
    ) -> (SubscriptionRequest, Arc<Security>) {
        let config =
            Arc::new(SubscriptionDataConfig::new(symbol.clone(), Resolution::Minute, TickType::Trade));
        let security = Arc::new(Security::new(
            symbol.clone(),
            ExchangeHours::new(symbol.market().time_zone()),
        ));
        let request = SubscriptionRequest::for_security(
            None,
            Arc::clone(&security),
            config,
            start,
            utc(2030, 1, 1, 0, 0),
        );
        (request, security)
    }

    #[test]
    fn take_until_respects_the_frontier() {
        let symbol = Symbol::equity("SPY", Market::Usa);
        let (request, _) = equity_request(&symbol, utc(2024, 3, 1, 0, 0));
        let source = VecDataSource::new(vec![
            bar(&symbol, utc(2024, 3, 1, 14, 30), 500.0),
            bar(&symbol, utc(2024, 3, 1, 14, 31), 501.0),
            bar(&symbol, utc(2024, 3, 1, 14, 32), 502.0),
        ]);
        let subscription = Subscription::new(request, Box::new(source));

        let first = subscription.take_until(utc(2024, 3, 1, 14, 32));
        assert_eq!(first.len(), 2);
        assert_eq!(subscription.next_emit_time(), Some(utc(2024, 3, 1, 14, 33)));

        let rest = subscription.take_until(utc(2024, 3, 2, 0, 0));
        assert_eq!(rest.len(), 1);
        assert!(subscription.is_finished());
    }

    #[test]
    fn points_ending_before_the_request_start_are_skipped() {
        let symbol = Symbol::equity("SPY", Market::Usa);
        let (request, _) = equity_request(&symbol, utc(2024, 3, 4, 0, 0));
        let source = VecDataSource::new(vec![
            bar(&symbol, utc(2024, 3, 1, 14, 30), 499.0),
            bar(&symbol, utc(2024, 3, 4, 14, 30), 503.0),
        ]);
        let subscription = Subscription::new(request, Box::new(source));

        let points = subscription.take_until(utc(2024, 3, 5, 0, 0));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price(), 503.0);
    }

    #[test]
    fn canonical_streams_are_retagged_and_update_the_security() {
        let canonical = Symbol::canonical_future("ES", Market::Cme);
        let march = Symbol::future_contract(
            "ES",
            Market::Cme,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        );
        let config = Arc::new(SubscriptionDataConfig::new(
            canonical.clone(),
            Resolution::Minute,
            TickType::Trade,
        ));
        config.set_mapped_symbol(march.clone());
        let security = Arc::new(Security::new(
            canonical.clone(),
            ExchangeHours::new(chrono_tz::America::Chicago),
        ));
        let request = SubscriptionRequest::for_security(
            None,
            Arc::clone(&security),
            config,
            utc(2024, 3, 1, 0, 0),
            utc(2024, 4, 1, 0, 0),
        );
        let source = VecDataSource::new(vec![bar(&march, utc(2024, 3, 1, 14, 30), 5100.0)]);
        let subscription = Subscription::new(request, Box::new(source));

        let points = subscription.take_until(utc(2024, 3, 2, 0, 0));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].symbol(), &canonical);
        assert_eq!(security.price(), 5100.0);
    }

    #[test]
    fn pending_sources_stall_without_finishing() {
        let symbol = Symbol::equity("SPY", Market::Usa);
        let (request, _) = equity_request(&symbol, utc(2024, 3, 1, 0, 0));
        let source = ScriptedSource::new(vec![
            Ok(FeedPoll::Pending),
            Ok(FeedPoll::Ready(bar(&symbol, utc(2024, 3, 1, 14, 30), 500.0))),
            Ok(FeedPoll::Done),
        ]);
        let subscription = Subscription::new(request, Box::new(source));

        assert_eq!(subscription.next_emit_time(), None);
        assert!(!subscription.is_finished());

        assert_eq!(subscription.take_until(utc(2024, 3, 2, 0, 0)).len(), 1);
        assert!(subscription.is_finished());
    }

    #[test]
    fn source_errors_mark_the_subscription_failed() {
        let symbol = Symbol::equity("SPY", Market::Usa);
        let (request, _) = equity_request(&symbol, utc(2024, 3, 1, 0, 0));
        let source = ScriptedSource::new(vec![
            Ok(FeedPoll::Ready(bar(&symbol, utc(2024, 3, 1, 14, 30), 500.0))),
            Err(FeedError::Source("file truncated".to_string())),
        ]);
        let subscription = Subscription::new(request, Box::new(source));

        let points = subscription.take_until(utc(2024, 3, 2, 0, 0));
        assert_eq!(points.len(), 1);
        assert!(subscription.is_failed());
        assert!(!subscription.is_finished());
    }

    #[test]
    fn new_tradable_dates_fire_before_delivery_and_skip_weekends() {
        let symbol = Symbol::equity("SPY", Market::Usa);
        let (request, _) = equity_request(&symbol, utc(2024, 3, 1, 0, 0));
        let source = VecDataSource::new(vec![
            bar(&symbol, utc(2024, 3, 1, 14, 30), 500.0),
            bar(&symbol, utc(2024, 3, 2, 14, 30), 500.5),
            bar(&symbol, utc(2024, 3, 4, 14, 30), 501.0),
        ]);
        let subscription = Subscription::new(request, Box::new(source));
        let handler = Arc::new(RecordingHandler { dates: Mutex::new(Vec::new()) });
        subscription.register_tradable_date_handler(handler.clone());

        let points = subscription.take_until(utc(2024, 3, 5, 0, 0));
        assert_eq!(points.len(), 3);

        let fired = handler.dates.lock().clone();
        assert_eq!(
            fired,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            ]
        );
    }

    #[test]
    fn rebind_swaps_the_source_and_resets_the_cursor() {
        let canonical = Symbol::canonical_future("ES", Market::Cme);
        let march = Symbol::future_contract(
            "ES",
            Market::Cme,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        );
        let june = Symbol::future_contract(
            "ES",
            Market::Cme,
            NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(),
        );
        let config = Arc::new(SubscriptionDataConfig::new(
            canonical.clone(),
            Resolution::Minute,
            TickType::Trade,
        ));
        config.set_mapped_symbol(march.clone());
        let security = Arc::new(Security::new(
            canonical.clone(),
            ExchangeHours::new(chrono_tz::America::Chicago),
        ));
        let request = SubscriptionRequest::for_security(
            None,
            Arc::clone(&security),
            Arc::clone(&config),
            utc(2024, 3, 1, 0, 0),
            utc(2024, 7, 1, 0, 0),
        );
        let subscription = Subscription::new(
            request,
            Box::new(VecDataSource::new(vec![bar(&march, utc(2024, 3, 1, 14, 30), 5100.0)])),
        );
        assert!(!subscription.needs_rebind());
        assert_eq!(subscription.take_until(utc(2024, 3, 2, 0, 0)).len(), 1);

        config.set_mapped_symbol(june.clone());
        assert!(subscription.needs_rebind());

        // The replacement source starts before the roll; everything the old
        // contract already covered must be skipped.
        subscription.rebind(Box::new(VecDataSource::new(vec![
            bar(&june, utc(2024, 3, 1, 14, 30), 5090.0),
            bar(&june, utc(2024, 3, 11, 14, 30), 5150.0),
        ])));
        assert!(!subscription.needs_rebind());
        assert_eq!(subscription.bound_symbol(), june);

        let points = subscription.take_until(utc(2024, 3, 12, 0, 0));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].symbol(), &canonical);
        assert_eq!(points[0].price(), 5150.0);
    }

    #[test]
    fn registry_tracks_min_emit_time_and_symbol_counts() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.min_next_emit_time(), None);

        let spy = Symbol::equity("SPY", Market::Usa);
        let (spy_request, _) = equity_request(&spy, utc(2024, 3, 1, 0, 0));
        registry.insert(Arc::new(Subscription::new(
            spy_request,
            Box::new(VecDataSource::new(vec![bar(&spy, utc(2024, 3, 1, 14, 35), 500.0)])),
        )));

        let aapl = Symbol::equity("AAPL", Market::Usa);
        let (aapl_request, _) = equity_request(&aapl, utc(2024, 3, 1, 0, 0));
        registry.insert(Arc::new(Subscription::new(
            aapl_request,
            Box::new(VecDataSource::new(vec![bar(&aapl, utc(2024, 3, 1, 14, 32), 170.0)])),
        )));

        assert_eq!(registry.min_next_emit_time(), Some(utc(2024, 3, 1, 14, 33)));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_symbol_count(), 2);
        assert!(registry.has_symbol(&spy));
    }
}
