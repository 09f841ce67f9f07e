//! Error and configuration types for the staging cache.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default staging directory: a memory-backed filesystem on Linux.
pub const DEFAULT_STAGING_DIR: &str = "/dev/shm/stagecache";

/// The budget is the probed free space divided by this (half by default).
pub const DEFAULT_BUDGET_DIVISOR: u64 = 2;

/// Upper bound on how long the maintenance loop sleeps between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Filesystem operation that failed, carried in [`CacheError::Io`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    CreateDir,
    RemoveDir,
    Stat,
    Copy,
    RemoveFile,
    Probe,
}

impl std::fmt::Display for StorageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageOp::CreateDir => "create directory",
            StorageOp::RemoveDir => "remove directory",
            StorageOp::Stat => "stat",
            StorageOp::Copy => "copy",
            StorageOp::RemoveFile => "remove file",
            StorageOp::Probe => "probe capacity of",
        };
        f.write_str(name)
    }
}

/// Staging cache errors.
///
/// Every variant except [`CacheError::StillShared`] ends the caching
/// session: the cache never retries or degrades.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Storage failure on the staging area or a source file
    #[error("Failed to {op} '{}': {source}", .path.display())]
    Io {
        op: StorageOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Nothing left to cache after deduplication
    #[error("No files to cache: backlog is empty")]
    EmptyBacklog,

    /// A file larger than the whole budget reached the head of the backlog
    #[error(
        "File '{}' ({size} bytes) exceeds the staging budget of {capacity} bytes",
        .path.display()
    )]
    FileExceedsBudget {
        path: PathBuf,
        size: u64,
        capacity: u64,
    },

    /// Path has no file name component to stage under
    #[error("Path '{}' has no file name", .0.display())]
    InvalidPath(PathBuf),

    /// A thread panicked while holding the table lock
    #[error("Cache table lock poisoned")]
    LockPoisoned,

    /// The maintenance thread could not be started
    #[error("Failed to spawn maintenance thread: {0}")]
    Spawn(#[source] io::Error),

    /// Teardown requested while other handles to the table are alive
    #[error("Cache table is still shared; stop maintenance and consumers before shutdown")]
    StillShared,
}

impl CacheError {
    pub(crate) fn io(op: StorageOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Cache table configuration.
#[derive(Debug, Clone)]
pub struct CacheTableConfig {
    /// Directory on fast storage owned exclusively by this cache
    pub staging_root: PathBuf,
    /// Budget = probed free bytes / divisor
    pub budget_divisor: u64,
    /// Optional hard cap on the budget
    pub budget_limit: Option<u64>,
    /// Longest the maintenance loop waits for a completion before re-checking
    pub poll_interval: Duration,
}

impl Default for CacheTableConfig {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from(DEFAULT_STAGING_DIR),
            budget_divisor: DEFAULT_BUDGET_DIVISOR,
            budget_limit: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl CacheTableConfig {
    /// Create a configuration for the given staging root with default policy.
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
            ..Self::default()
        }
    }

    /// Cap the budget at `limit` bytes.
    pub fn with_budget_limit(mut self, limit: u64) -> Self {
        self.budget_limit = Some(limit);
        self
    }

    /// Set the maintenance wait interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Compute the byte budget from a capacity probe reading.
    pub fn budget_for(&self, available: u64) -> u64 {
        let budget = available / self.budget_divisor.max(1);
        match self.budget_limit {
            Some(limit) => budget.min(limit),
            None => budget,
        }
    }
}
