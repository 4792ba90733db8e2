//! Universe capability trait: policy objects deciding symbol membership.

use crate::data::MarketData;
use crate::error::SelectionError;
use crate::security::Security;
use crate::subscription::{
    NormalizationMode, Resolution, SubscriptionConfigService, SubscriptionDataConfig,
    SubscriptionRequest,
};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Subscription shape applied to securities a universe selects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniverseSettings {
    pub resolution: Resolution,
    pub fill_forward: bool,
    pub extended_market_hours: bool,
    pub normalization: NormalizationMode,
}

impl Default for UniverseSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::Minute,
            fill_forward: true,
            extended_market_hours: false,
            normalization: NormalizationMode::default(),
        }
    }
}

/// Outcome of one selection pass.
///
/// `Unchanged` means "keep the previous membership exactly"; it is distinct
/// from selecting an empty set, which removes every member.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Changed(Vec<Symbol>),
    Unchanged,
}

impl Selection {
    pub fn from_symbols(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Selection::Changed(symbols.into_iter().collect())
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Selection::Unchanged)
    }
}

/// Policy object deciding which symbols are active over time.
///
/// Implementations hold a [`UniverseContext`] and delegate the membership
/// accessors to it. Selection runs whenever the universe's own subscription
/// produces data; time-triggered variants additionally expose the trigger
/// instants that drive that subscription.
pub trait Universe: Send + Sync {
    /// Config of the universe's own selection-data stream.
    fn config(&self) -> Arc<SubscriptionDataConfig>;

    fn settings(&self) -> &UniverseSettings;

    /// Identity of this universe, the symbol of its own stream.
    fn symbol(&self) -> Symbol {
        self.config().symbol.clone()
    }

    /// Decide membership as of `utc_time` given the selection data that
    /// arrived this step.
    fn select_symbols(
        &self,
        utc_time: DateTime<Utc>,
        data: &[MarketData],
    ) -> Result<Selection, SelectionError>;

    /// Translate an accepted member into concrete subscription requests.
    fn subscription_requests(
        &self,
        security: &Arc<Security>,
        current_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
        service: &dyn SubscriptionConfigService,
    ) -> Vec<SubscriptionRequest> {
        let settings = self.settings();
        service
            .add(
                security.symbol().clone(),
                settings.resolution,
                settings.fill_forward,
                settings.extended_market_hours,
                settings.normalization,
                false,
            )
            .into_iter()
            .map(|config| {
                SubscriptionRequest::for_security(
                    Some(self.symbol()),
                    Arc::clone(security),
                    config,
                    current_utc,
                    end_utc,
                )
            })
            .collect()
    }

    /// Instants at which a time-triggered universe wants selection to run.
    /// `None` for universes driven purely by their data stream.
    fn trigger_times(
        &self,
        _start_utc: DateTime<Utc>,
        _end_utc: DateTime<Utc>,
    ) -> Option<Vec<DateTime<Utc>>> {
        None
    }

    /// Instant of the most recently applied selection, used by the selection
    /// pass to skip re-running a universe within the same step.
    fn last_selection_utc(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn record_selection(&self, _utc_time: DateTime<Utc>) {}

    fn members(&self) -> Vec<Arc<Security>>;

    fn contains(&self, symbol: &Symbol) -> bool;

    fn add_member(&self, security: Arc<Security>);

    fn remove_member(&self, symbol: &Symbol) -> Option<Arc<Security>>;
}

/// Shared state every universe variant embeds: its own stream config, the
/// settings applied to members, and the current member set used for diffing.
pub struct UniverseContext {
    config: Arc<SubscriptionDataConfig>,
    settings: UniverseSettings,
    members: RwLock<HashMap<Symbol, Arc<Security>>>,
    last_selection_utc: RwLock<Option<DateTime<Utc>>>,
}

impl UniverseContext {
    pub fn new(config: Arc<SubscriptionDataConfig>, settings: UniverseSettings) -> Self {
        Self {
            config,
            settings,
            members: RwLock::new(HashMap::new()),
            last_selection_utc: RwLock::new(None),
        }
    }

    pub fn config(&self) -> Arc<SubscriptionDataConfig> {
        Arc::clone(&self.config)
    }

    pub fn settings(&self) -> &UniverseSettings {
        &self.settings
    }

    pub fn members(&self) -> Vec<Arc<Security>> {
        self.members.read().values().cloned().collect()
    }

    pub fn member_symbols(&self) -> Vec<Symbol> {
        self.members.read().keys().cloned().collect()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.members.read().contains_key(symbol)
    }

    pub fn add_member(&self, security: Arc<Security>) {
        self.members.write().insert(security.symbol().clone(), security);
    }

    pub fn remove_member(&self, symbol: &Symbol) -> Option<Arc<Security>> {
        self.members.write().remove(symbol)
    }

    /// Most recent instant a selection was applied, recorded by the
    /// selection pass to skip redundant reselection.
    pub fn last_selection_utc(&self) -> Option<DateTime<Utc>> {
        *self.last_selection_utc.read()
    }

    pub fn record_selection(&self, utc_time: DateTime<Utc>) {
        *self.last_selection_utc.write() = Some(utc_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ExchangeHours;
    use crate::subscription::TickType;
    use crate::symbol::Market;
    use chrono::TimeZone;

    fn context() -> UniverseContext {
        let symbol = Symbol::custom("TEST-UNIVERSE", Market::Usa);
        let config = Arc::new(SubscriptionDataConfig::new(
            symbol,
            Resolution::Daily,
            TickType::Trade,
        ));
        UniverseContext::new(config, UniverseSettings::default())
    }

    #[test]
    fn membership_round_trip() {
        let context = context();
        let security = Arc::new(Security::new(
            Symbol::equity("AAA", Market::Usa),
            ExchangeHours::new(chrono_tz::America::New_York),
        ));

        assert!(!context.contains(security.symbol()));
        context.add_member(Arc::clone(&security));
        assert!(context.contains(security.symbol()));
        assert_eq!(context.members().len(), 1);

        let removed = context.remove_member(security.symbol());
        assert!(removed.is_some());
        assert!(context.members().is_empty());
    }

    #[test]
    fn selection_instant_is_recorded() {
        let context = context();
        assert!(context.last_selection_utc().is_none());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        context.record_selection(now);
        assert_eq!(context.last_selection_utc(), Some(now));
    }

    #[test]
    fn unchanged_is_not_an_empty_selection() {
        assert!(Selection::Unchanged.is_unchanged());
        assert!(!Selection::from_symbols([]).is_unchanged());
    }
}
