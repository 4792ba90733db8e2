//! Applying universe selections to the active subscription set.

use crate::data_manager::DataManager;
use crate::error::{FeedError, SyncError};
use chrono::{DateTime, Utc};
use market_data::{MarketData, SecurityChanges, Security, Selection, Symbol, Universe};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Run one universe's selection for the data that arrived this step and
/// reshape the active subscription set to the outcome. Returns the security
/// delta this selection produced.
///
/// Dropped members lose every stream the universe owns for them; new members
/// get streams through the universe's subscription requests. Re-adding a
/// stream that is already active is a no-op, which is how the canonical
/// stream of a continuous universe survives every roll.
pub(crate) fn apply_universe_selection(
    data_manager: &DataManager,
    universe: &Arc<dyn Universe>,
    utc_time: DateTime<Utc>,
    data: &[MarketData],
) -> Result<SecurityChanges, SyncError> {
    if universe.last_selection_utc() == Some(utc_time) {
        return Ok(SecurityChanges::none());
    }

    let selection = universe.select_symbols(utc_time, data).map_err(|source| {
        SyncError::Selection { universe: universe.symbol().to_string(), source }
    })?;
    let selected: HashSet<Symbol> = match selection {
        Selection::Unchanged => return Ok(SecurityChanges::none()),
        Selection::Changed(symbols) => symbols.into_iter().collect(),
    };
    universe.record_selection(utc_time);

    let universe_symbol = universe.symbol();
    let mut removed: Vec<Arc<Security>> = Vec::new();
    for member in universe.members() {
        if selected.contains(member.symbol()) {
            continue;
        }
        if let Some(security) = universe.remove_member(member.symbol()) {
            for subscription in data_manager.subscriptions() {
                if subscription.universe() == Some(&universe_symbol)
                    && !subscription.is_universe_subscription()
                    && subscription.config().symbol == *security.symbol()
                {
                    data_manager.remove_subscription(subscription.config());
                }
            }
            removed.push(security);
        }
    }

    let mut added: Vec<Arc<Security>> = Vec::new();
    for symbol in selected {
        if universe.contains(&symbol) {
            continue;
        }
        let security = data_manager.security(&symbol);
        let requests =
            universe.subscription_requests(&security, utc_time, data_manager.end_utc(), data_manager);
        for request in requests {
            match data_manager.add_subscription(request) {
                Ok(_) => {}
                Err(FeedError::DuplicateSubscription(config)) => {
                    debug!(%config, "selection re-added an active stream");
                }
                Err(err) => return Err(err.into()),
            }
        }
        universe.add_member(Arc::clone(&security));
        added.push(security);
    }

    if added.is_empty() && removed.is_empty() {
        return Ok(SecurityChanges::none());
    }
    let changes = SecurityChanges::new(added, removed);
    info!(universe = %universe_symbol, %changes, time = %utc_time, "universe selection applied");
    Ok(changes)
}
