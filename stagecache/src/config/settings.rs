//! Settings structs, one per INI section.

use super::defaults::*;
use crate::cache::CacheTableConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub staging: StagingSettings,
    pub logging: LoggingSettings,
}

/// `[staging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSettings {
    /// Directory on fast storage used exclusively by the cache
    pub directory: PathBuf,
    /// Optional cap on the staging budget in bytes
    pub budget_limit: Option<u64>,
    /// Maintenance and consumer wait interval in milliseconds
    pub poll_interval_ms: u64,
    /// Number of consumer threads
    pub consumers: usize,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            staging: StagingSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            directory: default_staging_dir(),
            budget_limit: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            consumers: DEFAULT_CONSUMERS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

impl StagingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ConfigFile {
    /// Cache table configuration for these settings.
    pub fn to_table_config(&self) -> CacheTableConfig {
        let mut config = CacheTableConfig::new(self.staging.directory.clone())
            .with_poll_interval(self.staging.poll_interval());
        config.budget_limit = self.staging.budget_limit;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_table_config_carries_staging_settings() {
        let mut config = ConfigFile::default();
        config.staging.directory = PathBuf::from("/mnt/ram/stage");
        config.staging.budget_limit = Some(1024);
        config.staging.poll_interval_ms = 50;

        let table = config.to_table_config();

        assert_eq!(table.staging_root, PathBuf::from("/mnt/ram/stage"));
        assert_eq!(table.budget_limit, Some(1024));
        assert_eq!(table.poll_interval, Duration::from_millis(50));
        assert_eq!(table.budget_divisor, 2);
    }
}
