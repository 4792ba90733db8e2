//! Fluent set-narrowing filter over a derivative contract chain.
//!
//! One filter instance lives as long as its owning universe and is refreshed
//! with fresh candidates at the start of every selection cycle. The gate
//! state (cache date, dynamic mark, schedule) survives refreshes; the
//! candidate set, local time, and type mask do not.

use crate::MAX_EXPIRY_HORIZON_DAYS;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use market_data::Symbol;
use std::collections::HashMap;
use std::fmt;

/// Which expiration classes `apply_types_filter` keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationTypes {
    Standard,
    Weekly,
    StandardAndWeekly,
}

impl ExpirationTypes {
    pub fn includes_standard(&self) -> bool {
        matches!(self, ExpirationTypes::Standard | ExpirationTypes::StandardAndWeekly)
    }

    pub fn includes_weekly(&self) -> bool {
        matches!(self, ExpirationTypes::Weekly | ExpirationTypes::StandardAndWeekly)
    }
}

/// Default expiration classifier: third-week expirations (day 15 through 21)
/// are the standard monthly cycle, everything else is a weekly.
pub fn third_week_standard(expiry: NaiveDate) -> bool {
    (15..=21).contains(&expiry.day())
}

enum Gate {
    /// Accept when the local calendar date changed since the last evaluation.
    NewLocalDay,
    Custom(Box<dyn Fn(NaiveDateTime) -> bool + Send + Sync>),
}

/// Chainable filtering view over a set of contract symbols.
///
/// Every operation narrows the candidate set in place and returns the
/// receiver, so chains read left to right. The explicit-list and selector
/// overrides replace the set outright instead of narrowing.
pub struct ContractFilterUniverse {
    symbols: Vec<Symbol>,
    local_time: Option<NaiveDateTime>,
    types: ExpirationTypes,
    dynamic: bool,
    cache_date: Option<NaiveDate>,
    gate: Option<Gate>,
    classifier: Box<dyn Fn(NaiveDate) -> bool + Send + Sync>,
}

impl ContractFilterUniverse {
    pub fn new(candidates: Vec<Symbol>, local_time: NaiveDateTime) -> Self {
        let mut filter = Self::empty();
        filter.refresh(candidates, local_time);
        filter
    }

    /// A filter with no candidates and no local time, the state before the
    /// first selection cycle.
    pub fn empty() -> Self {
        Self {
            symbols: Vec::new(),
            local_time: None,
            types: ExpirationTypes::Standard,
            dynamic: false,
            cache_date: None,
            gate: None,
            classifier: Box::new(third_week_standard),
        }
    }

    /// Reset candidates, local time, and the type mask for a new selection
    /// cycle. Gate state is deliberately preserved.
    pub fn refresh(&mut self, candidates: Vec<Symbol>, local_time: NaiveDateTime) -> &mut Self {
        self.symbols = candidates;
        self.local_time = Some(local_time);
        self.types = ExpirationTypes::Standard;
        self
    }

    pub fn standards_only(&mut self) -> &mut Self {
        self.types = ExpirationTypes::Standard;
        self
    }

    pub fn weeklys_only(&mut self) -> &mut Self {
        self.types = ExpirationTypes::Weekly;
        self
    }

    pub fn include_weeklys(&mut self) -> &mut Self {
        self.types = ExpirationTypes::StandardAndWeekly;
        self
    }

    /// Replace the expiration classifier consumed by `apply_types_filter`.
    pub fn set_classifier(
        &mut self,
        classifier: impl Fn(NaiveDate) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Keep candidates whose expiration class matches the configured mask.
    /// The classification is memoized per distinct expiration date for the
    /// duration of this call; contracts sharing an expiry are classified
    /// once. Symbols without an expiration always pass.
    pub fn apply_types_filter(&mut self) -> &mut Self {
        let types = self.types;
        let classifier = &self.classifier;
        let mut memo: HashMap<NaiveDate, bool> = HashMap::new();
        self.symbols.retain(|symbol| match symbol.expiry() {
            None => true,
            Some(expiry) => {
                let standard = *memo.entry(expiry).or_insert_with(|| classifier(expiry));
                if standard { types.includes_standard() } else { types.includes_weekly() }
            }
        });
        self
    }

    /// Keep contracts expiring within `[local_date + min_days, local_date +
    /// max_days]` inclusive. A no-op until the filter has been refreshed
    /// with a local time.
    pub fn expiration(&mut self, min_days: i64, max_days: i64) -> &mut Self {
        let Some(local_time) = self.local_time else {
            return self;
        };
        let max_days = max_days.min(MAX_EXPIRY_HORIZON_DAYS);
        let earliest = local_time.date() + Duration::days(min_days);
        let latest = local_time.date() + Duration::days(max_days);
        self.symbols.retain(|symbol| match symbol.expiry() {
            None => true,
            Some(expiry) => expiry >= earliest && expiry <= latest,
        });
        self
    }

    /// Keep every contract sharing the minimum expiration date. Contracts
    /// with identical expirations are never split. Identity on an empty set.
    pub fn front_month(&mut self) -> &mut Self {
        let Some(front) = self.min_expiry() else {
            return self;
        };
        self.symbols.retain(|symbol| symbol.expiry() == Some(front));
        self
    }

    /// Keep everything after the front-month group. Identity on an empty set.
    pub fn back_months(&mut self) -> &mut Self {
        let Some(front) = self.min_expiry() else {
            return self;
        };
        self.symbols.retain(|symbol| matches!(symbol.expiry(), Some(e) if e > front));
        self
    }

    /// Front month of the back-months subset.
    pub fn back_month(&mut self) -> &mut Self {
        self.back_months().front_month()
    }

    /// Replace the candidate set with an explicit contract list, discarding
    /// prior narrowing.
    pub fn set_contracts(&mut self, contracts: impl IntoIterator<Item = Symbol>) -> &mut Self {
        self.symbols = contracts.into_iter().collect();
        self
    }

    /// Replace the candidate set with the selector's output, materialized
    /// eagerly at the call site.
    pub fn select_contracts(
        &mut self,
        selector: impl FnOnce(&[Symbol]) -> Vec<Symbol>,
    ) -> &mut Self {
        self.symbols = selector(&self.symbols);
        self
    }

    /// Replace the default once-per-day gate with a caller-supplied
    /// predicate over local time.
    pub fn schedule(
        &mut self,
        predicate: impl Fn(NaiveDateTime) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.gate = Some(Gate::Custom(Box::new(predicate)));
        self
    }

    /// Gate selection on the local calendar date having advanced, i.e. run
    /// the filter once at each market open.
    pub fn only_apply_at_market_open(&mut self) -> &mut Self {
        self.gate = Some(Gate::NewLocalDay);
        self
    }

    /// Request reselection on every evaluation until one is accepted.
    pub fn mark_dynamic(&mut self) -> &mut Self {
        self.dynamic = true;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Stateful selection gate. True on the first evaluation ever; an
    /// installed gate predicate wins otherwise; the default accepts once per
    /// distinct local calendar date, or every time while marked dynamic.
    /// Every evaluation records the local date, and an accepting one clears
    /// the dynamic mark.
    pub fn should_select(&mut self) -> bool {
        let Some(local_time) = self.local_time else {
            return true;
        };
        let local_date = local_time.date();
        let accepted = match &self.gate {
            Some(Gate::NewLocalDay) => self.cache_date != Some(local_date),
            Some(Gate::Custom(predicate)) => predicate(local_time),
            None => match self.cache_date {
                None => true,
                Some(cached) => self.dynamic || cached != local_date,
            },
        };
        self.cache_date = Some(local_date);
        if accepted {
            self.dynamic = false;
        }
        accepted
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn local_time(&self) -> Option<NaiveDateTime> {
        self.local_time
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn min_expiry(&self) -> Option<NaiveDate> {
        self.symbols.iter().filter_map(Symbol::expiry).min()
    }
}

impl<'a> IntoIterator for &'a ContractFilterUniverse {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}

impl fmt::Debug for ContractFilterUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractFilterUniverse")
            .field("symbols", &self.symbols.len())
            .field("local_time", &self.local_time)
            .field("types", &self.types)
            .field("dynamic", &self.dynamic)
            .field("cache_date", &self.cache_date)
            .finish()
    }
}
