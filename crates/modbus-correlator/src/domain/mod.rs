//! Domain layer: transaction slots, id allocation, statistics and
//! configuration. No I/O; the only async code is the wait on a pending slot.

pub mod allocator;
pub mod config;
pub mod statistics;
pub mod transaction_table;

pub use allocator::TransactionIdAllocator;
pub use config::{CorrelatorConfig, CorrelatorConfigBuilder, MAX_RESPONSE_TIMEOUT_MS};
pub use statistics::{StatisticsAggregator, StatisticsSnapshot, DEFAULT_SLOW_SET_CAPACITY};
pub use transaction_table::{
    PendingRequest, Resolution, ResolveOutcome, SlotState, TransactionTable,
};
