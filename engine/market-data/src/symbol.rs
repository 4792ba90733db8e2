//! Instrument identity: product roots, markets, and contract symbols.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Venue an instrument trades on. Determines the default exchange time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    Usa,
    Cme,
    Ice,
}

impl Market {
    /// Default exchange time zone for securities on this market.
    pub fn time_zone(&self) -> chrono_tz::Tz {
        match self {
            Market::Usa => chrono_tz::America::New_York,
            Market::Cme | Market::Ice => chrono_tz::America::Chicago,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Market::Usa => "usa",
            Market::Cme => "cme",
            Market::Ice => "ice",
        };
        write!(f, "{name}")
    }
}

/// Broad instrument class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecurityKind {
    Equity,
    Future,
    Option,
    /// Caller-defined data feeds (constituent lists, signals).
    Custom,
}

impl SecurityKind {
    pub fn is_derivative(&self) -> bool {
        matches!(self, SecurityKind::Future | SecurityKind::Option)
    }
}

/// Value identity of one instrument.
///
/// A derivative symbol without an expiration date is the *canonical*
/// (continuous) symbol for its root; concrete contracts carry an expiration
/// and, for options, a strike. Identity covers every field, so two contracts
/// of the same root differing only in expiry are distinct symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    root: String,
    market: Market,
    kind: SecurityKind,
    expiry: Option<NaiveDate>,
    /// Strike price in cents, options only.
    strike: Option<u32>,
}

impl Symbol {
    pub fn equity(root: impl Into<String>, market: Market) -> Self {
        Self { root: root.into(), market, kind: SecurityKind::Equity, expiry: None, strike: None }
    }

    /// Canonical continuous-future symbol for a product root.
    pub fn canonical_future(root: impl Into<String>, market: Market) -> Self {
        Self { root: root.into(), market, kind: SecurityKind::Future, expiry: None, strike: None }
    }

    pub fn future_contract(root: impl Into<String>, market: Market, expiry: NaiveDate) -> Self {
        Self {
            root: root.into(),
            market,
            kind: SecurityKind::Future,
            expiry: Some(expiry),
            strike: None,
        }
    }

    pub fn option_contract(
        root: impl Into<String>,
        market: Market,
        expiry: NaiveDate,
        strike_cents: u32,
    ) -> Self {
        Self {
            root: root.into(),
            market,
            kind: SecurityKind::Option,
            expiry: Some(expiry),
            strike: Some(strike_cents),
        }
    }

    pub fn custom(root: impl Into<String>, market: Market) -> Self {
        Self { root: root.into(), market, kind: SecurityKind::Custom, expiry: None, strike: None }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn kind(&self) -> SecurityKind {
        self.kind
    }

    /// Contract expiration date, `None` for canonical and non-derivative symbols.
    pub fn expiry(&self) -> Option<NaiveDate> {
        self.expiry
    }

    pub fn strike_cents(&self) -> Option<u32> {
        self.strike
    }

    /// True for the continuous symbol of a derivative product.
    pub fn is_canonical(&self) -> bool {
        self.kind.is_derivative() && self.expiry.is_none()
    }

    /// True for a concrete derivative contract with an expiration date.
    pub fn is_contract(&self) -> bool {
        self.kind.is_derivative() && self.expiry.is_some()
    }

    /// The canonical symbol backing this contract (expiry and strike stripped).
    pub fn canonical(&self) -> Symbol {
        Symbol {
            root: self.root.clone(),
            market: self.market,
            kind: self.kind,
            expiry: None,
            strike: None,
        }
    }

    /// True when `other` is a contract of this canonical symbol.
    pub fn is_contract_of(&self, other: &Symbol) -> bool {
        other.is_contract() && self.is_canonical() && other.canonical() == *self
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_canonical() {
            return write!(f, "/{}", self.root);
        }
        match (self.expiry, self.strike) {
            (Some(expiry), Some(strike)) => {
                write!(f, "{}-{}-{}", self.root, expiry.format("%Y%m%d"), strike)
            }
            (Some(expiry), None) => write!(f, "{}-{}", self.root, expiry.format("%Y%m%d")),
            _ => write!(f, "{}", self.root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn canonical_and_contract_relationship() {
        let canonical = Symbol::canonical_future("ES", Market::Cme);
        let march = Symbol::future_contract("ES", Market::Cme, d(2024, 3, 15));

        assert!(canonical.is_canonical());
        assert!(!canonical.is_contract());
        assert!(march.is_contract());
        assert!(!march.is_canonical());
        assert_eq!(march.canonical(), canonical);
        assert!(canonical.is_contract_of(&march));
    }

    #[test]
    fn contracts_differing_only_in_expiry_are_distinct() {
        let a = Symbol::future_contract("ES", Market::Cme, d(2024, 3, 15));
        let b = Symbol::future_contract("ES", Market::Cme, d(2024, 6, 21));
        assert_ne!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn display_formats() {
        let canonical = Symbol::canonical_future("ES", Market::Cme);
        assert_eq!(canonical.to_string(), "/ES");

        let contract = Symbol::future_contract("ES", Market::Cme, d(2024, 3, 15));
        assert_eq!(contract.to_string(), "ES-20240315");

        let option = Symbol::option_contract("SPX", Market::Usa, d(2024, 3, 15), 450_000);
        assert_eq!(option.to_string(), "SPX-20240315-450000");

        assert_eq!(Symbol::equity("SPY", Market::Usa).to_string(), "SPY");
    }

    #[test]
    fn ordering_sorts_by_expiry_within_root() {
        let mut contracts = vec![
            Symbol::future_contract("ES", Market::Cme, d(2024, 6, 21)),
            Symbol::future_contract("ES", Market::Cme, d(2024, 3, 15)),
        ];
        contracts.sort();
        assert_eq!(contracts[0].expiry(), Some(d(2024, 3, 15)));
    }
}
