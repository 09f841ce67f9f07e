//! stagecache CLI - stage files onto fast storage ahead of a consumer command.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::run::RunArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagecache")]
#[command(version = stagecache::VERSION)]
#[command(about = "Stage files onto fast storage ahead of a consumer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage files and run a command on each staged copy
    ///
    /// Example: stagecache run data/*.raw -- decode --input {}
    Run(RunArgs),

    /// Show free space and the resulting staging budget
    Probe {
        /// Directory to probe (defaults to the configured staging directory)
        dir: Option<PathBuf>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Probe { dir } => commands::probe::run(dir),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
