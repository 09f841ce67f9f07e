//! Probe command: free space and staging budget for a directory.

use stagecache::cache::{CapacityProbe, FsCapacityProbe};
use stagecache::config::{format_size_approx, ConfigFile};
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Run the probe command.
pub fn run(dir: Option<PathBuf>) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let requested = dir.unwrap_or_else(|| config.staging.directory.clone());

    // The staging directory is created at session start, so probe the
    // filesystem it will live on.
    let target = nearest_existing(&requested).ok_or_else(|| {
        CliError::Config(format!(
            "no existing directory at or above '{}'",
            requested.display()
        ))
    })?;

    let available = FsCapacityProbe.available_bytes(target)?;
    let budget = config.to_table_config().budget_for(available);

    println!("Directory: {}", requested.display());
    if target != requested.as_path() {
        println!("  (probed {})", target.display());
    }
    println!(
        "  Available: {} ({} bytes)",
        format_size_approx(available),
        available
    );
    println!(
        "  Budget:    {} ({} bytes)",
        format_size_approx(budget),
        budget
    );

    Ok(())
}

fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.is_dir())
}
