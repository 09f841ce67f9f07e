//! Configuration for the staging cache.
//!
//! Settings are read from `~/.stagecache/config.ini`:
//!
//! ```ini
//! [staging]
//! directory = /dev/shm/stagecache
//! budget_limit = 4GB
//! poll_interval_ms = 250
//! consumers = 1
//!
//! [logging]
//! file = ~/.stagecache/logs/stagecache.log
//! ```
//!
//! Missing files and keys fall back to defaults. Sizes accept suffixes
//! (`KB`, `MB`, `GB`, 1024-based).

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    clamp_consumers, default_log_file, default_staging_dir, DEFAULT_CONSUMERS,
    DEFAULT_LOG_FILE_NAME, DEFAULT_POLL_INTERVAL_MS, MAX_CONSUMERS, MAX_POLL_INTERVAL_MS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LoggingSettings, StagingSettings};
pub use size::{format_size, format_size_approx, parse_size, Size, SizeParseError};
