//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use stagecache::cache::CacheError;
use stagecache::config::ConfigFileError;
use std::fmt;
use std::path::PathBuf;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Fatal staging cache error
    Cache(CacheError),
    /// Failed to read the `--list` file
    ReadList { path: PathBuf, error: std::io::Error },
    /// Consumer command could not be set up
    InvalidCommand(String),
    /// The consumer command failed for some staged files
    ConsumerFailures { failed: u64, total: u64 },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Cache(CacheError::FileExceedsBudget { .. }) => {
                eprintln!();
                eprintln!("The staging budget is half the free space on the staging filesystem.");
                eprintln!("Free up space there, point --staging at a larger filesystem,");
                eprintln!("or remove budget_limit from the configuration.");
            }
            CliError::Cache(CacheError::EmptyBacklog) => {
                eprintln!();
                eprintln!("Pass source files as arguments or with --list FILE.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Cache(e) => write!(f, "Staging cache error: {}", e),
            CliError::ReadList { path, error } => {
                write!(f, "Failed to read file list '{}': {}", path.display(), error)
            }
            CliError::InvalidCommand(msg) => write!(f, "Invalid consumer command: {}", msg),
            CliError::ConsumerFailures { failed, total } => {
                write!(f, "Consumer command failed for {} of {} files", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Cache(e) => Some(e),
            CliError::ReadList { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}
