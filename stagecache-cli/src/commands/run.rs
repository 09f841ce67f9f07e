//! Run command: stage a backlog and hand every staged copy to a command.

use clap::Args;
use stagecache::cache::CacheTable;
use stagecache::config::{clamp_consumers, format_size_approx, ConfigFile, Size};
use stagecache::session::{run_session, FileHandler, HandlerError, SessionOptions};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Placeholder replaced by the staged file path in command arguments.
const PATH_PLACEHOLDER: &str = "{}";

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Source files to stage, in processing order
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Read additional source files from FILE, one per line ('#' starts a comment)
    #[arg(long, value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Staging directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub staging: Option<PathBuf>,

    /// Number of consumer threads (overrides config)
    #[arg(long, value_name = "N")]
    pub consumers: Option<usize>,

    /// Cap on the staging budget, e.g. 2GB (overrides config)
    #[arg(long, value_name = "SIZE")]
    pub budget: Option<Size>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Do not mirror log output to stdout
    #[arg(long, short)]
    pub quiet: bool,

    /// Command to run for each staged file; '{}' is replaced by the staged
    /// path, otherwise the path is appended
    #[arg(last = true, required = true, value_name = "CMD")]
    pub command: Vec<OsString>,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.debug, !args.quiet)?;
    runner.log_startup("run");

    let config = apply_overrides(runner.config().clone(), &args);
    let handler = CommandHandler::new(&args.command)?;
    let files = collect_backlog(&args.paths, args.list.as_deref())?;
    info!("Backlog: {} file(s)", files.len());

    let table = CacheTable::builder(config.to_table_config())
        .with_logger(runner.logger())
        .initialize(files)?;
    println!(
        "Staging in {} (budget {})",
        table.staging_root().display(),
        format_size_approx(table.capacity_bytes())
    );

    let options = SessionOptions {
        consumers: config.staging.consumers,
        consumer_wait: config.staging.poll_interval(),
    };
    let report = run_session(table, options, Arc::new(handler), runner.logger())?;

    let total = report.processed + report.failed;
    println!(
        "Processed {} file(s), {} failed, {} staged",
        report.processed,
        report.failed,
        format_size_approx(report.stats.bytes_staged)
    );

    if report.failed > 0 {
        return Err(CliError::ConsumerFailures {
            failed: report.failed,
            total,
        });
    }
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(mut config: ConfigFile, args: &RunArgs) -> ConfigFile {
    if let Some(dir) = &args.staging {
        config.staging.directory = dir.clone();
    }
    if let Some(n) = args.consumers {
        config.staging.consumers = clamp_consumers(n);
    }
    if let Some(size) = args.budget {
        config.staging.budget_limit = Some(size.bytes());
    }
    config
}

/// Positional paths first, then the entries of the list file.
fn collect_backlog(paths: &[PathBuf], list: Option<&Path>) -> Result<Vec<PathBuf>, CliError> {
    let mut files = paths.to_vec();
    if let Some(list) = list {
        let content = fs::read_to_string(list).map_err(|error| CliError::ReadList {
            path: list.to_path_buf(),
            error,
        })?;
        files.extend(parse_list(&content));
    }
    Ok(files)
}

/// One path per non-empty line; lines starting with '#' are skipped.
fn parse_list(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}

/// Runs an external command for each staged file.
#[derive(Debug, Clone)]
struct CommandHandler {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandHandler {
    fn new(command: &[OsString]) -> Result<Self, CliError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| CliError::InvalidCommand("no command given after '--'".to_string()))?;
        if program.is_empty() {
            return Err(CliError::InvalidCommand("empty program name".to_string()));
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Arguments for `staged`, substituting the placeholder or appending.
    fn arguments_for(&self, staged: &Path) -> Vec<OsString> {
        let has_placeholder = self
            .args
            .iter()
            .any(|arg| arg.to_string_lossy().contains(PATH_PLACEHOLDER));
        if !has_placeholder {
            let mut args = self.args.clone();
            args.push(staged.as_os_str().to_os_string());
            return args;
        }

        self.args
            .iter()
            .map(|arg| {
                if arg == PATH_PLACEHOLDER {
                    staged.as_os_str().to_os_string()
                } else {
                    match arg.to_str() {
                        Some(s) if s.contains(PATH_PLACEHOLDER) => OsString::from(
                            s.replace(PATH_PLACEHOLDER, &staged.to_string_lossy()),
                        ),
                        _ => arg.clone(),
                    }
                }
            })
            .collect()
    }
}

impl FileHandler for CommandHandler {
    fn handle(&self, staged: &Path) -> Result<(), HandlerError> {
        let status = Command::new(&self.program)
            .args(self.arguments_for(staged))
            .status()
            .map_err(|e| format!("failed to start {}: {}", self.program.to_string_lossy(), e))?;
        if !status.success() {
            return Err(format!("{} exited with {}", self.program.to_string_lossy(), status).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_parse_list_skips_blanks_and_comments() {
        let content = "# inputs\n/data/a.raw\n\n   /data/b.raw  \n#/data/c.raw\n";
        assert_eq!(
            parse_list(content),
            vec![PathBuf::from("/data/a.raw"), PathBuf::from("/data/b.raw")]
        );
    }

    #[test]
    fn test_collect_backlog_positional_first() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("files.txt");
        fs::write(&list, "/from/list\n").unwrap();

        let files = collect_backlog(&[PathBuf::from("/from/args")], Some(&list)).unwrap();

        assert_eq!(
            files,
            vec![PathBuf::from("/from/args"), PathBuf::from("/from/list")]
        );
    }

    #[test]
    fn test_collect_backlog_missing_list() {
        let temp = TempDir::new().unwrap();
        let result = collect_backlog(&[], Some(&temp.path().join("missing.txt")));
        assert!(matches!(result, Err(CliError::ReadList { .. })));
    }

    #[test]
    fn test_placeholder_substitution() {
        let handler = CommandHandler::new(&os(&["decode", "--input", "{}", "--tag={}"])).unwrap();
        let args = handler.arguments_for(Path::new("/stage/a.raw"));
        assert_eq!(args, os(&["--input", "/stage/a.raw", "--tag=/stage/a.raw"]));
    }

    #[test]
    fn test_path_appended_without_placeholder() {
        let handler = CommandHandler::new(&os(&["md5sum", "-b"])).unwrap();
        let args = handler.arguments_for(Path::new("/stage/a.raw"));
        assert_eq!(args, os(&["-b", "/stage/a.raw"]));
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandHandler::new(&[]),
            Err(CliError::InvalidCommand(_))
        ));
        assert!(CommandHandler::new(&os(&[""])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_handler_reports_exit_status() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.bin");
        fs::write(&staged, b"data").unwrap();

        let ok = CommandHandler::new(&os(&["test", "-f"])).unwrap();
        assert!(ok.handle(&staged).is_ok());

        let missing = CommandHandler::new(&os(&["test", "-f"])).unwrap();
        assert!(missing.handle(&temp.path().join("absent")).is_err());

        let unknown = CommandHandler::new(&os(&["stagecache-no-such-program"])).unwrap();
        assert!(unknown.handle(&staged).is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let args = RunArgs {
            paths: vec![],
            list: None,
            staging: Some(PathBuf::from("/mnt/fast")),
            consumers: Some(0),
            budget: Some(Size(4096)),
            debug: false,
            quiet: true,
            command: os(&["true"]),
        };

        let config = apply_overrides(ConfigFile::default(), &args);

        assert_eq!(config.staging.directory, PathBuf::from("/mnt/fast"));
        assert_eq!(config.staging.consumers, 1);
        assert_eq!(config.staging.budget_limit, Some(4096));
    }
}
