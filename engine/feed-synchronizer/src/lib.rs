//! # feed-synchronizer
//!
//! Merges independently paced market data subscriptions into one time-ordered
//! sequence of [`TimeSlice`] snapshots.
//!
//! Each step advances a monotonic frontier, drains every subscription up to
//! it, routes selection data to its universe, and emits the combined slice.
//! The same loop serves backtests, where the frontier jumps to the next
//! pending data point and the sequence is finite, and live trading, where the
//! frontier follows the wall clock and the loop idles through quiet periods
//! until it is canceled.

pub mod config;
pub mod data_manager;
pub mod error;
pub mod handle;
mod selection;
pub mod source;
pub mod subscription;
pub mod synchronizer;
pub mod time_provider;
pub mod time_slice;



pub use config::{SyncMode, SynchronizerConfig};
pub use data_manager::DataManager;
pub use error::{FeedError, SyncError};
pub use handle::{StrategyHandle, StrategyStatus};
pub use source::{DataSource, DataSourceFactory, FeedPoll, ReplayDataFactory, ScheduleSource, VecDataSource};
pub use subscription::Subscription;
pub use synchronizer::{SubscriptionSynchronizer, Synchronizer};
pub use time_provider::{
    ManualTimeProvider, RealTimeProvider, SubscriptionFrontierTimeProvider, TimeProvider,
};
pub use time_slice::TimeSlice;

/// Re-export commonly used types
pub use isolator::CancelToken;
pub use market_data::{SecurityChanges, SubscriptionRequest};

/// Current version of the synchronizer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default ceiling on distinct tradable symbols with active subscriptions
pub const DEFAULT_SUBSCRIPTION_LIMIT: usize = 1000;

/// Default live-mode sleep between empty steps
pub const DEFAULT_LIVE_IDLE_WAIT_MS: u64 = 50;
