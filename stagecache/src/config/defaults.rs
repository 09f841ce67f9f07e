//! Default values for configuration settings.

use crate::cache::DEFAULT_STAGING_DIR;
use std::path::PathBuf;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
/// One hour.
pub const MAX_POLL_INTERVAL_MS: u64 = 60 * 60 * 1000;
pub const DEFAULT_CONSUMERS: usize = 1;
pub const MAX_CONSUMERS: usize = 64;
pub const DEFAULT_LOG_FILE_NAME: &str = "stagecache.log";

pub fn default_staging_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STAGING_DIR)
}

/// `~/.stagecache/logs/stagecache.log`
pub fn default_log_file() -> PathBuf {
    super::file::config_directory()
        .join("logs")
        .join(DEFAULT_LOG_FILE_NAME)
}

/// Keep consumer count within 1..=MAX_CONSUMERS.
pub fn clamp_consumers(value: usize) -> usize {
    value.clamp(1, MAX_CONSUMERS)
}
