//! Chain provider implementations.

use chrono::{DateTime, NaiveDate, Utc};
use market_data::{ChainError, ChainProvider, Symbol};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// In-memory chain provider for replay and tests. Contracts drop out of the
/// chain once their expiration date has passed.
#[derive(Default)]
pub struct StaticChainProvider {
    chains: RwLock<HashMap<Symbol, Vec<Symbol>>>,
}

impl StaticChainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the full contract list for a canonical symbol.
    pub fn set_chain(&self, canonical: Symbol, contracts: Vec<Symbol>) {
        self.chains.write().insert(canonical, contracts);
    }
}

impl ChainProvider for StaticChainProvider {
    fn contracts(&self, canonical: &Symbol, at: DateTime<Utc>) -> Result<Vec<Symbol>, ChainError> {
        if !canonical.is_canonical() {
            return Err(ChainError::NotCanonical { symbol: canonical.to_string() });
        }
        let chains = self.chains.read();
        let Some(contracts) = chains.get(canonical) else {
            return Err(ChainError::NotFound { symbol: canonical.to_string() });
        };
        let today = at.date_naive();
        Ok(contracts
            .iter()
            .filter(|contract| contract.expiry().map_or(true, |expiry| expiry >= today))
            .cloned()
            .collect())
    }
}

/// Decorator memoizing chain fetches per (symbol, UTC date), so repeated
/// same-day lookups from mapping providers and universes hit the cache.
pub struct CachingChainProvider {
    inner: Arc<dyn ChainProvider>,
    cache: Mutex<HashMap<(Symbol, NaiveDate), Vec<Symbol>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingChainProvider {
    pub fn new(inner: Arc<dyn ChainProvider>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl ChainProvider for CachingChainProvider {
    fn contracts(&self, canonical: &Symbol, at: DateTime<Utc>) -> Result<Vec<Symbol>, ChainError> {
        let key = (canonical.clone(), at.date_naive());
        if let Some(chain) = self.cache.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(chain.clone());
        }
        let chain = self.inner.contracts(canonical, at)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(symbol = %canonical, date = %key.1, contracts = chain.len(), "chain cached");
        self.cache.lock().insert(key, chain.clone());
        Ok(chain)
    }
}
