//! Error types for subscription admission and the synchronization loop.

use market_data::SelectionError;
use thiserror::Error;

/// Subscription admission and data source failures.
///
/// A `Source` error raised while pulling an individual stream is recoverable:
/// the stream is dropped and the loop continues. The admission variants are
/// returned to the caller that tried to add the subscription; when admission
/// happens inside a selection pass, `SubscriptionLimitExceeded` is fatal while
/// `DuplicateSubscription` is treated as a no-op.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("a subscription already exists for {0}")]
    DuplicateSubscription(String),

    #[error("subscription limit of {limit} distinct symbols reached, cannot add {symbol}")]
    SubscriptionLimitExceeded { limit: usize, symbol: String },

    #[error("a universe already exists for {0}")]
    DuplicateUniverse(String),

    #[error("data source failed: {0}")]
    Source(String),
}

/// Fatal synchronization failures. Any of these ends the slice sequence and
/// moves the strategy into a runtime-error state.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("selection failed for universe {universe}")]
    Selection {
        universe: String,
        #[source]
        source: SelectionError,
    },

    #[error(transparent)]
    Feed(#[from] FeedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_message_names_the_rejected_symbol() {
        let err = FeedError::SubscriptionLimitExceeded { limit: 2, symbol: "MSFT".to_string() };
        assert_eq!(
            err.to_string(),
            "subscription limit of 2 distinct symbols reached, cannot add MSFT"
        );
    }

    #[test]
    fn selection_failures_carry_their_cause() {
        let err = SyncError::Selection {
            universe: "/ES".to_string(),
            source: SelectionError::Selector { reason: "boom".to_string() },
        };
        assert_eq!(err.to_string(), "selection failed for universe /ES");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source, Some("selection function failed: boom".to_string()));
    }

    #[test]
    fn feed_errors_convert_transparently() {
        let err: SyncError = FeedError::Source("socket closed".to_string()).into();
        assert_eq!(err.to_string(), "data source failed: socket closed");
    }
}
