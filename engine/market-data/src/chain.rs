//! Contract chain collaborator.

use crate::error::ChainError;
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};

/// Supplies the candidate contracts of a canonical derivative symbol as of a
/// UTC instant. No ordering is guaranteed; callers impose it via filters.
pub trait ChainProvider: Send + Sync {
    fn contracts(&self, canonical: &Symbol, at: DateTime<Utc>) -> Result<Vec<Symbol>, ChainError>;
}
