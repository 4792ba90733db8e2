// market-data - shared domain model for the lockstep engine

mod chain;
mod changes;
mod data;
mod error;
mod security;
mod subscription;
mod symbol;
mod universe;

pub use chain::ChainProvider;
pub use changes::SecurityChanges;
pub use data::{Constituent, ConstituentList, MarketData, QuoteBar, Tick, TradeBar};
pub use error::{ChainError, SelectionError};
pub use security::{ExchangeHours, Security};
pub use subscription::{
    DataKind, NormalizationMode, Resolution, SubscriptionConfigService, SubscriptionDataConfig,
    SubscriptionRequest, TickType,
};
pub use symbol::{Market, SecurityKind, Symbol};
pub use universe::{Selection, Universe, UniverseContext, UniverseSettings};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
