//! CLI runner for common setup.
//!
//! Loads the configuration file and initializes logging once per command.

use crate::error::CliError;
use stagecache::config::ConfigFile;
use stagecache::log::{Logger, TracingLogger};
use stagecache::logging::{init_logging, split_log_path, LoggingGuard};
use std::sync::Arc;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - Enables debug-level logging regardless of RUST_LOG
    /// * `stdout_enabled` - Mirror log output to stdout
    pub fn new(debug_mode: bool, stdout_enabled: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, stdout_enabled, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Library logger forwarding to `tracing`.
    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::new(TracingLogger)
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("stagecache v{}", stagecache::VERSION);
        info!("stagecache CLI: {} command", command);
    }
}
