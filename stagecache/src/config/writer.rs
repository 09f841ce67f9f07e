//! Serializes a [`ConfigFile`] into the commented INI written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let budget_limit = config
        .staging
        .budget_limit
        .map(format_size)
        .unwrap_or_default();

    format!(
        r#"[staging]
; Staging directory on fast storage (RAM disk, NVMe). The directory is
; wiped when a session starts and removed when it ends, so it must not be
; shared with anything else.
directory = {}
; Optional cap on the staging budget (e.g. 4GB, 500MB). The budget is half
; of the free space on the staging filesystem, limited to this value.
; Leave empty for no cap.
budget_limit = {}
; How often, in milliseconds, the cache reclaims finished files and stages
; new ones when idle
poll_interval_ms = {}
; Number of consumer threads processing staged files
consumers = {}

[logging]
; Log file location
file = {}
"#,
        path_to_string(&config.staging.directory),
        budget_limit,
        config.staging.poll_interval_ms,
        config.staging.consumers,
        path_to_string(&config.logging.file),
    )
}

/// Render a path, collapsing the home directory back to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}
