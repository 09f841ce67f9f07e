//! Bounded staging cache for large files.
//!
//! Files from an ordered backlog are copied onto fast, size-limited storage
//! while they fit in the budget, handed to consumers one at a time, and
//! deleted once the consumer reports them finished. The maintenance loop
//! keeps reclaiming and refilling until the backlog is exhausted and every
//! staged copy has been reclaimed.

mod backlog;
mod daemon;
mod entry;
mod stats;
mod storage;
mod table;
mod types;

pub use backlog::{Backlog, Deduplicated};
pub use daemon::MaintenanceDaemon;
pub use entry::{staged_name, CacheEntry};
pub use stats::CacheStats;
pub use storage::{CapacityProbe, FixedCapacity, FsCapacityProbe, LocalStorage, StagingStorage};
pub use table::{CacheTable, CacheTableBuilder, CycleOutcome};
pub use types::{
    CacheError, CacheTableConfig, StorageOp, DEFAULT_BUDGET_DIVISOR, DEFAULT_POLL_INTERVAL,
    DEFAULT_STAGING_DIR,
};
