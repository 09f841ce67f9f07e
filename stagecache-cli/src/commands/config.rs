//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show`, and `config init`.

use clap::Subcommand;
use stagecache::config::{config_file_path, format_size, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration (file values over defaults)
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    for line in describe(&config) {
        println!("{}", line);
    }
    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() && !force {
        println!("Configuration already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Human-readable listing of every setting.
fn describe(config: &ConfigFile) -> Vec<String> {
    let budget_limit = config
        .staging
        .budget_limit
        .map(format_size)
        .unwrap_or_else(|| "(not set)".to_string());

    vec![
        "[staging]".to_string(),
        format!("  directory = {}", config.staging.directory.display()),
        format!("  budget_limit = {}", budget_limit),
        format!("  poll_interval_ms = {}", config.staging.poll_interval_ms),
        format!("  consumers = {}", config.staging.consumers),
        String::new(),
        "[logging]".to_string(),
        format!("  file = {}", config.logging.file.display()),
    ]
}
