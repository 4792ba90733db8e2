//! Continuous-contract universe: rolls a canonical derivative symbol across
//! its front-month contracts.

use crate::filter::ContractFilterUniverse;
use crate::{ROLL_MAX_EXPIRY_DAYS, ROLL_MIN_EXPIRY_DAYS};
use chrono::{DateTime, TimeZone, Utc};
use market_data::{
    ChainProvider, MarketData, Resolution, Security, Selection, SelectionError,
    SubscriptionConfigService, SubscriptionDataConfig, SubscriptionRequest, Symbol, TickType,
    Universe, UniverseContext, UniverseSettings,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Universe that, once per tradable exchange day, picks the single contract
/// representing a continuous instrument.
///
/// Selection fetches the chain as of the trigger instant and applies the
/// roll rule: expiration between [`ROLL_MIN_EXPIRY_DAYS`] and
/// [`ROLL_MAX_EXPIRY_DAYS`] days out, front month. The canonical security's
/// underlying reference only ever moves to a later-dated contract.
pub struct ContinuousContractUniverse {
    context: UniverseContext,
    security: Arc<Security>,
    chain_provider: Arc<dyn ChainProvider>,
    filter: Mutex<ContractFilterUniverse>,
}

impl ContinuousContractUniverse {
    pub fn new(
        security: Arc<Security>,
        settings: UniverseSettings,
        chain_provider: Arc<dyn ChainProvider>,
    ) -> Self {
        let canonical = security.symbol();
        let universe_symbol = Symbol::custom(
            format!("{}-continuous-universe", canonical.root().to_lowercase()),
            canonical.market(),
        );
        let config = Arc::new(
            SubscriptionDataConfig::new(universe_symbol, Resolution::Daily, TickType::Trade)
                .with_time_zones(chrono_tz::UTC, security.exchange().time_zone())
                .with_internal_feed(true),
        );
        Self {
            context: UniverseContext::new(config, settings),
            security,
            chain_provider,
            filter: Mutex::new(ContractFilterUniverse::empty()),
        }
    }

    /// Canonical continuous symbol this universe rolls.
    pub fn canonical(&self) -> &Symbol {
        self.security.symbol()
    }

    pub fn security(&self) -> &Arc<Security> {
        &self.security
    }
}

impl Universe for ContinuousContractUniverse {
    fn config(&self) -> Arc<SubscriptionDataConfig> {
        self.context.config()
    }

    fn settings(&self) -> &UniverseSettings {
        self.context.settings()
    }

    fn select_symbols(
        &self,
        utc_time: DateTime<Utc>,
        _data: &[MarketData],
    ) -> Result<Selection, SelectionError> {
        let chain = match self.chain_provider.contracts(self.canonical(), utc_time) {
            Ok(chain) => chain,
            Err(err) => {
                // A missing chain is a degraded cycle, not a fatal one.
                warn!(symbol = %self.canonical(), error = %err, "chain fetch failed, selection unchanged");
                return Ok(Selection::Unchanged);
            }
        };

        let local_time = self.security.exchange().local_time(utc_time);
        let mut filter = self.filter.lock();
        filter.refresh(chain, local_time);
        if !filter.should_select() {
            return Ok(Selection::Unchanged);
        }
        filter.expiration(ROLL_MIN_EXPIRY_DAYS, ROLL_MAX_EXPIRY_DAYS).front_month();

        match filter.symbols() {
            [] => {
                debug!(symbol = %self.canonical(), "no contract in the roll window");
                Ok(Selection::Unchanged)
            }
            [contract] => Ok(Selection::Changed(vec![contract.clone()])),
            more => Err(SelectionError::Selector {
                reason: format!(
                    "expected one front-month contract for {}, found {}",
                    self.canonical(),
                    more.len()
                ),
            }),
        }
    }

    fn subscription_requests(
        &self,
        security: &Arc<Security>,
        current_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
        service: &dyn SubscriptionConfigService,
    ) -> Vec<SubscriptionRequest> {
        let settings = self.settings();
        let contract_configs = service.add(
            security.symbol().clone(),
            settings.resolution,
            settings.fill_forward,
            settings.extended_market_hours,
            settings.normalization,
            false,
        );
        let canonical_configs = service.add(
            self.security.symbol().clone(),
            settings.resolution,
            settings.fill_forward,
            settings.extended_market_hours,
            settings.normalization,
            false,
        );

        // Monotonic rollover: rebind only to a strictly later expiration.
        let rebind = match self.security.underlying() {
            None => true,
            Some(tracked) => match (security.symbol().expiry(), tracked.symbol().expiry()) {
                (Some(next), Some(current)) => next > current,
                _ => false,
            },
        };
        if rebind {
            info!(
                canonical = %self.security.symbol(),
                contract = %security.symbol(),
                "continuous underlying rebound"
            );
            self.security.set_underlying(Arc::clone(security));
        }

        // The canonical stream mirrors whichever contract is tracked, even
        // when this particular selection did not win the rebind.
        let mapped = self
            .security
            .underlying()
            .map(|tracked| tracked.symbol().clone())
            .unwrap_or_else(|| security.symbol().clone());
        for config in &canonical_configs {
            config.set_mapped_symbol(mapped.clone());
        }

        let mut requests = Vec::with_capacity(contract_configs.len() + canonical_configs.len());
        for config in contract_configs {
            requests.push(SubscriptionRequest::for_security(
                Some(self.symbol()),
                Arc::clone(security),
                config,
                current_utc,
                end_utc,
            ));
        }
        for config in canonical_configs {
            requests.push(SubscriptionRequest::for_security(
                Some(self.symbol()),
                Arc::clone(&self.security),
                config,
                current_utc,
                end_utc,
            ));
        }
        requests
    }

    fn trigger_times(
        &self,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Option<Vec<DateTime<Utc>>> {
        let hours = self.security.exchange();
        let tz = hours.time_zone();
        let from = hours.local_date(start_utc);
        let until = hours.local_date(end_utc);
        let times = hours
            .trading_days(from, until)
            .filter_map(|date| {
                let midnight = date.and_hms_opt(0, 0, 0)?;
                tz.from_local_datetime(&midnight).earliest().map(|local| local.with_timezone(&Utc))
            })
            .filter(|utc| *utc >= start_utc && *utc <= end_utc)
            .collect();
        Some(times)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StaticChainProvider;
    use chrono::NaiveDate;
    use market_data::{ExchangeHours, Market, NormalizationMode};
    use parking_lot::RwLock;
    use std::collections::HashMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn utc(y: i32, m: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, 12, 0, 0).unwrap()
    }

    fn canonical_security() -> Arc<Security> {
        Arc::new(Security::new(
            Symbol::canonical_future("ES", Market::Cme),
            ExchangeHours::new(chrono_tz::America::Chicago),
        ))
    }

    fn contract_security(expiry: NaiveDate) -> Arc<Security> {
        Arc::new(Security::new(
            Symbol::future_contract("ES", Market::Cme, expiry),
            ExchangeHours::new(chrono_tz::America::Chicago),
        ))
    }

    /// Hands out configs like the data manager does, without the manager.
    struct RecordingConfigService {
        configs: RwLock<HashMap<Symbol, Arc<SubscriptionDataConfig>>>,
    }

    impl RecordingConfigService {
        fn new() -> Self {
            Self { configs: RwLock::new(HashMap::new()) }
        }
    }

    impl SubscriptionConfigService for RecordingConfigService {
        fn add(
            &self,
            symbol: Symbol,
            resolution: Resolution,
            fill_forward: bool,
            extended_market_hours: bool,
            normalization: NormalizationMode,
            internal_feed: bool,
        ) -> Vec<Arc<SubscriptionDataConfig>> {
            let mut configs = self.configs.write();
            let config = configs
                .entry(symbol.clone())
                .or_insert_with(|| {
                    Arc::new(
                        SubscriptionDataConfig::new(symbol, resolution, TickType::Trade)
                            .with_fill_forward(fill_forward)
                            .with_extended_market_hours(extended_market_hours)
                            .with_normalization(normalization)
                            .with_internal_feed(internal_feed),
                    )
                })
                .clone();
            vec![config]
        }
    }

    fn universe_with_chain(
        contracts: Vec<Symbol>,
    ) -> (ContinuousContractUniverse, Arc<Security>) {
        let security = canonical_security();
        let provider = Arc::new(StaticChainProvider::new());
        provider.set_chain(security.symbol().clone(), contracts);
        let universe = ContinuousContractUniverse::new(
            Arc::clone(&security),
            UniverseSettings::default(),
            provider,
        );
        (universe, security)
    }

    #[test]
    fn selects_front_month_within_roll_window() {
        let (universe, _) = universe_with_chain(vec![
            Symbol::future_contract("ES", Market::Cme, d(2024, 3, 4)), // expires in 3 days
            Symbol::future_contract("ES", Market::Cme, d(2024, 3, 15)),
            Symbol::future_contract("ES", Market::Cme, d(2024, 6, 21)),
        ]);
        let selection = universe.select_symbols(utc(2024, 3, 1), &[]).unwrap();
        assert_eq!(
            selection,
            Selection::Changed(vec![Symbol::future_contract("ES", Market::Cme, d(2024, 3, 15))])
        );
    }

    #[test]
    fn empty_window_is_unchanged() {
        let (universe, _) = universe_with_chain(vec![Symbol::future_contract(
            "ES",
            Market::Cme,
            d(2024, 3, 2), // inside the five-day exclusion
        )]);
        let selection = universe.select_symbols(utc(2024, 3, 1), &[]).unwrap();
        assert_eq!(selection, Selection::Unchanged);
    }

    #[test]
    fn chain_provider_failure_is_swallowed() {
        let security = canonical_security();
        let provider = Arc::new(StaticChainProvider::new()); // knows no chains
        let universe = ContinuousContractUniverse::new(
            Arc::clone(&security),
            UniverseSettings::default(),
            provider,
        );
        let selection = universe.select_symbols(utc(2024, 3, 1), &[]).unwrap();
        assert_eq!(selection, Selection::Unchanged);
    }

    #[test]
    fn rollover_is_monotonic_even_out_of_order() {
        let (universe, canonical) = universe_with_chain(Vec::new());
        let service = RecordingConfigService::new();
        let end = utc(2025, 1, 1);

        let june = contract_security(d(2024, 6, 21));
        universe.subscription_requests(&june, utc(2024, 5, 1), end, &service);
        assert_eq!(canonical.underlying().unwrap().symbol(), june.symbol());

        // An out-of-order selection of the March contract must not revert.
        let march = contract_security(d(2024, 3, 15));
        universe.subscription_requests(&march, utc(2024, 2, 1), end, &service);
        assert_eq!(canonical.underlying().unwrap().symbol(), june.symbol());

        let september = contract_security(d(2024, 9, 20));
        universe.subscription_requests(&september, utc(2024, 6, 10), end, &service);
        assert_eq!(canonical.underlying().unwrap().symbol(), september.symbol());
    }

    #[test]
    fn requests_cover_contract_and_canonical() {
        let (universe, canonical) = universe_with_chain(Vec::new());
        let service = RecordingConfigService::new();
        let march = contract_security(d(2024, 3, 15));

        let requests =
            universe.subscription_requests(&march, utc(2024, 2, 1), utc(2024, 12, 31), &service);
        assert_eq!(requests.len(), 2);

        let symbols: Vec<&Symbol> =
            requests.iter().map(|r| &r.config.symbol).collect();
        assert!(symbols.contains(&march.symbol()));
        assert!(symbols.contains(&canonical.symbol()));

        let canonical_request = requests
            .iter()
            .find(|r| &r.config.symbol == canonical.symbol())
            .unwrap();
        assert_eq!(canonical_request.config.mapped_symbol(), march.symbol().clone());
        assert!(!canonical_request.is_universe_subscription);
        assert_eq!(canonical_request.universe.as_ref(), Some(&universe.symbol()));
    }

    #[test]
    fn one_trigger_per_trading_day() {
        let (universe, _) = universe_with_chain(Vec::new());
        // Friday 2024-03-01 through Tuesday 2024-03-05.
        let times = universe
            .trigger_times(
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 5, 23, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(times.len(), 3, "friday, monday, tuesday");
    }
}
