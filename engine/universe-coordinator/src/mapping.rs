//! Front-month re-mapping on tradable-date boundaries.

use crate::filter::ContractFilterUniverse;
use crate::{ROLL_MAX_EXPIRY_DAYS, ROLL_MIN_EXPIRY_DAYS};
use chrono::{DateTime, NaiveDate, Utc};
use market_data::{ChainProvider, SubscriptionDataConfig, Symbol};
use std::sync::Arc;
use tracing::{info, warn};

/// Observer of a subscription's exchange-local calendar date advancing.
/// Fired by the subscription cursor before the first data of the new date is
/// surfaced.
pub trait TradableDateHandler: Send + Sync {
    fn on_new_tradable_date(&self, date: NaiveDate, utc_time: DateTime<Utc>);
}

/// Keeps a canonical config's mapped symbol pointed at the current
/// front-month contract.
///
/// Each new tradable date it refetches the chain (through a caching provider
/// so same-date refetches are cheap), reapplies the roll rule, and updates
/// the config's mapped symbol when the winner changed. The config's own
/// symbol, the identity consumers subscribe to, never changes.
pub struct ContractMappingEventProvider {
    config: Arc<SubscriptionDataConfig>,
    chain_provider: Arc<dyn ChainProvider>,
}

impl ContractMappingEventProvider {
    pub fn new(config: Arc<SubscriptionDataConfig>, chain_provider: Arc<dyn ChainProvider>) -> Self {
        Self { config, chain_provider }
    }

    fn resolve_front_month(&self, utc_time: DateTime<Utc>) -> Option<Symbol> {
        let chain = match self.chain_provider.contracts(&self.config.symbol, utc_time) {
            Ok(chain) => chain,
            Err(err) => {
                warn!(symbol = %self.config.symbol, error = %err, "mapping refresh skipped");
                return None;
            }
        };
        let mut filter = ContractFilterUniverse::new(chain, self.config.local_time(utc_time));
        filter.expiration(ROLL_MIN_EXPIRY_DAYS, ROLL_MAX_EXPIRY_DAYS).front_month();
        filter.symbols().first().cloned()
    }
}

impl TradableDateHandler for ContractMappingEventProvider {
    fn on_new_tradable_date(&self, _date: NaiveDate, utc_time: DateTime<Utc>) {
        let Some(next) = self.resolve_front_month(utc_time) else {
            return;
        };
        let current = self.config.mapped_symbol();
        if next == current {
            return;
        }
        info!(
            symbol = %self.config.symbol,
            from = %current,
            to = %next,
            "updating continuous contract mapping"
        );
        self.config.set_mapped_symbol(next);
    }
}
