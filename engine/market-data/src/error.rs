//! Shared error types for selection and chain lookup.

use thiserror::Error;

/// Chain provider failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChainError {
    #[error("no contract chain known for {symbol}")]
    NotFound { symbol: String },

    #[error("chain provider failed for {symbol}: {reason}")]
    Provider { symbol: String, reason: String },

    #[error("{symbol} is not a canonical derivative symbol")]
    NotCanonical { symbol: String },
}

/// A universe's selection pass failed.
///
/// Universes that can degrade gracefully catch the recoverable variants and
/// report an unchanged selection; anything that escapes the universe is
/// treated as fatal by the synchronizer.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("chain lookup failed: {0}")]
    Chain(#[from] ChainError),

    #[error("selection function failed: {reason}")]
    Selector { reason: String },

    #[error("selection data malformed for {symbol}: {reason}")]
    MalformedData { symbol: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_error_converts_to_selection_error() {
        let chain = ChainError::NotFound { symbol: "/ES".to_string() };
        let selection: SelectionError = chain.clone().into();
        assert!(matches!(selection, SelectionError::Chain(c) if c == chain));
    }

    #[test]
    fn messages_name_the_symbol() {
        let err = ChainError::Provider { symbol: "/ES".to_string(), reason: "closed".to_string() };
        assert_eq!(err.to_string(), "chain provider failed for /ES: closed");
    }
}
