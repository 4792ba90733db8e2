//! Subscription and universe bookkeeping behind the synchronizer.

use crate::config::SynchronizerConfig;
use crate::error::FeedError;
use crate::source::{DataSource, DataSourceFactory, ScheduleSource};
use crate::subscription::{Subscription, SubscriptionRegistry};
use crate::time_provider::SubscriptionFrontierTimeProvider;
use chrono::{DateTime, Utc};
use market_data::{
    ChainProvider, ExchangeHours, NormalizationMode, Resolution, Security,
    SubscriptionConfigService, SubscriptionDataConfig, SubscriptionRequest, Symbol, TickType,
    Universe,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use universe_coordinator::{CachingChainProvider, ContractMappingEventProvider};

/// Owns every active subscription, universe, and runtime security for one
/// run, and admits new subscriptions against the configured limit.
///
/// Adding a subscription whose config already has an active stream either
/// rebinds it (when the config's mapped contract moved) or is rejected as a
/// duplicate. Canonical derivative streams get a mapping event handler
/// attached so their physical contract follows the calendar.
pub struct DataManager {
    registry: Arc<SubscriptionRegistry>,
    securities: RwLock<HashMap<Symbol, Arc<Security>>>,
    universes: RwLock<Vec<(Symbol, Arc<dyn Universe>)>>,
    configs: RwLock<Vec<Arc<SubscriptionDataConfig>>>,
    factory: Arc<dyn DataSourceFactory>,
    mapping_chain: Arc<CachingChainProvider>,
    subscription_limit: usize,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
}

impl DataManager {
    pub fn new(
        config: &SynchronizerConfig,
        factory: Arc<dyn DataSourceFactory>,
        chain_provider: Arc<dyn ChainProvider>,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            registry: Arc::new(SubscriptionRegistry::new()),
            securities: RwLock::new(HashMap::new()),
            universes: RwLock::new(Vec::new()),
            configs: RwLock::new(Vec::new()),
            factory,
            mapping_chain: Arc::new(CachingChainProvider::new(chain_provider)),
            subscription_limit: config.subscription_limit,
            start_utc,
            end_utc,
        }
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start_utc
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end_utc
    }

    /// Frontier time provider over this manager's active subscriptions.
    pub fn frontier_time_provider(&self) -> Arc<SubscriptionFrontierTimeProvider> {
        Arc::new(SubscriptionFrontierTimeProvider::new(self.start_utc, Arc::clone(&self.registry)))
    }

    /// Get or create the runtime security for a symbol. Created securities
    /// use the default trading calendar of the symbol's market.
    pub fn security(&self, symbol: &Symbol) -> Arc<Security> {
        if let Some(existing) = self.securities.read().get(symbol) {
            return Arc::clone(existing);
        }
        let mut securities = self.securities.write();
        Arc::clone(securities.entry(symbol.clone()).or_insert_with(|| {
            Arc::new(Security::new(
                symbol.clone(),
                ExchangeHours::new(symbol.market().time_zone()),
            ))
        }))
    }

    /// Register a security built with a custom trading calendar, replacing
    /// any default-calendar one created for the same symbol.
    pub fn register_security(&self, security: Arc<Security>) {
        self.securities.write().insert(security.symbol().clone(), security);
    }

    /// Admit a subscription. Returns `Ok(true)` for a new stream, `Ok(false)`
    /// when an existing stream was rebound to the config's new mapped
    /// contract.
    pub fn add_subscription(&self, request: SubscriptionRequest) -> Result<bool, FeedError> {
        if let Some(existing) = self.registry.find(&request.config) {
            if existing.needs_rebind() {
                let source = self.factory.create(&request)?;
                existing.rebind(source);
                return Ok(false);
            }
            return Err(FeedError::DuplicateSubscription(request.config.to_string()));
        }

        let config = &request.config;
        if !config.internal_feed && !config.symbol.is_canonical() {
            let active = self.registry.active_symbol_count();
            if active >= self.subscription_limit && !self.registry.has_symbol(&config.symbol) {
                return Err(FeedError::SubscriptionLimitExceeded {
                    limit: self.subscription_limit,
                    symbol: config.symbol.to_string(),
                });
            }
        }

        let source = self.factory.create(&request)?;
        let subscription = Arc::new(Subscription::new(request, source));
        if subscription.config().symbol.is_canonical() && !subscription.is_universe_subscription() {
            subscription.register_tradable_date_handler(Arc::new(
                ContractMappingEventProvider::new(
                    Arc::clone(subscription.config()),
                    Arc::clone(&self.mapping_chain) as Arc<dyn ChainProvider>,
                ),
            ));
        }
        debug!(config = %subscription.config(), "subscription added");
        self.registry.insert(subscription);
        Ok(true)
    }

    pub fn remove_subscription(&self, config: &SubscriptionDataConfig) -> bool {
        match self.registry.remove(config) {
            Some(subscription) => {
                subscription.dispose();
                debug!(config = %subscription.config(), "subscription removed");
                true
            }
            None => false,
        }
    }

    /// Register a universe and open its selection-data stream. Time-triggered
    /// universes stream a synthetic schedule; the rest go through the source
    /// factory like any other subscription.
    pub fn add_universe(&self, universe: Arc<dyn Universe>) -> Result<(), FeedError> {
        let symbol = universe.symbol();
        {
            let universes = self.universes.read();
            if universes.iter().any(|(existing, _)| *existing == symbol) {
                return Err(FeedError::DuplicateUniverse(symbol.to_string()));
            }
        }

        let config = universe.config();
        let security = self.security(&config.symbol);
        let request = SubscriptionRequest::for_universe(
            symbol.clone(),
            security,
            Arc::clone(&config),
            self.start_utc,
            self.end_utc,
        );
        let source: Box<dyn DataSource> = match universe.trigger_times(self.start_utc, self.end_utc)
        {
            Some(times) => Box::new(ScheduleSource::new(config.symbol.clone(), times)),
            None => self.factory.create(&request)?,
        };
        self.registry.insert(Arc::new(Subscription::new(request, source)));
        self.universes.write().push((symbol.clone(), universe));
        info!(universe = %symbol, "universe added");
        Ok(())
    }

    /// Deregister a universe, dropping its selection stream and every member
    /// stream it owns.
    pub fn remove_universe(&self, symbol: &Symbol) -> bool {
        let universe = {
            let mut universes = self.universes.write();
            match universes.iter().position(|(existing, _)| existing == symbol) {
                Some(index) => universes.remove(index).1,
                None => return false,
            }
        };

        for subscription in self.registry.snapshot() {
            if subscription.universe() == Some(symbol) {
                self.remove_subscription(subscription.config());
            }
        }
        for member in universe.members() {
            universe.remove_member(member.symbol());
        }
        info!(universe = %symbol, "universe removed");
        true
    }

    pub fn universe(&self, symbol: &Symbol) -> Option<Arc<dyn Universe>> {
        self.universes
            .read()
            .iter()
            .find(|(existing, _)| existing == symbol)
            .map(|(_, universe)| Arc::clone(universe))
    }

    pub fn universes(&self) -> Vec<Arc<dyn Universe>> {
        self.universes.read().iter().map(|(_, universe)| Arc::clone(universe)).collect()
    }

    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.registry.snapshot()
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// Release every subscription. Idempotent; every termination path of the
    /// loop ends up here.
    pub fn dispose(&self) {
        let count = self.registry.len();
        for subscription in self.registry.snapshot() {
            subscription.dispose();
        }
        self.registry.clear();
        if count > 0 {
            debug!(count, "subscriptions released");
        }
    }
}

impl SubscriptionConfigService for DataManager {
    fn add(
        &self,
        symbol: Symbol,
        resolution: Resolution,
        fill_forward: bool,
        extended_market_hours: bool,
        normalization: NormalizationMode,
        internal_feed: bool,
    ) -> Vec<Arc<SubscriptionDataConfig>> {
        let mut tick_types = vec![TickType::Trade];
        if symbol.kind().is_derivative() {
            tick_types.push(TickType::Quote);
        }

        let mut configs = self.configs.write();
        tick_types
            .into_iter()
            .map(|tick_type| {
                let candidate = SubscriptionDataConfig::new(symbol.clone(), resolution, tick_type)
                    .with_fill_forward(fill_forward)
                    .with_extended_market_hours(extended_market_hours)
                    .with_normalization(normalization)
                    .with_internal_feed(internal_feed);
                match configs.iter().find(|config| config.as_ref() == &candidate) {
                    Some(existing) => Arc::clone(existing),
                    None => {
                        let config = Arc::new(candidate);
                        configs.push(Arc::clone(&config));
                        config
                    }
                }
            })
            .collect()
    }
}
