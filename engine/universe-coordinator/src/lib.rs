// universe-coordinator - contract selection, filtering, and continuous mapping

pub mod chain;
pub mod constituents;
pub mod continuous;
pub mod filter;
pub mod func;
pub mod mapping;

pub use chain::{CachingChainProvider, StaticChainProvider};
pub use constituents::ConstituentUniverse;
pub use continuous::ContinuousContractUniverse;
pub use filter::{third_week_standard, ContractFilterUniverse, ExpirationTypes};
pub use func::FuncUniverse;
pub use mapping::{ContractMappingEventProvider, TradableDateHandler};

/// Roll rule window: contracts expiring inside five days are excluded, the
/// front month is picked from what remains within the next hundred days.
pub const ROLL_MIN_EXPIRY_DAYS: i64 = 5;
pub const ROLL_MAX_EXPIRY_DAYS: i64 = 100;

/// Ceiling applied to expiration-window bounds so arithmetic on caller-chosen
/// offsets cannot overflow date math.
pub const MAX_EXPIRY_HORIZON_DAYS: i64 = 36_500;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
