//! INI parsing: maps `config.ini` keys onto [`ConfigFile`] fields.

use ini::Ini;
use std::path::PathBuf;

use super::defaults::{clamp_consumers, MAX_POLL_INTERVAL_MS};
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
/// Unknown sections and keys are ignored.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [staging] section
    if let Some(section) = ini.section(Some("staging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.staging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("budget_limit") {
            let v = v.trim();
            if !v.is_empty() {
                let limit = parse_size(v).map_err(|e| invalid("staging", "budget_limit", v, e))?;
                if limit == 0 {
                    return Err(invalid("staging", "budget_limit", v, "must be greater than 0"));
                }
                config.staging.budget_limit = Some(limit);
            }
        }
        if let Some(v) = section.get("poll_interval_ms") {
            let v = v.trim();
            let ms: u64 = v
                .parse()
                .map_err(|_| invalid("staging", "poll_interval_ms", v, "must be a whole number"))?;
            if ms == 0 {
                return Err(invalid("staging", "poll_interval_ms", v, "must be greater than 0"));
            }
            if ms > MAX_POLL_INTERVAL_MS {
                return Err(invalid(
                    "staging",
                    "poll_interval_ms",
                    v,
                    format!("must be at most {}", MAX_POLL_INTERVAL_MS),
                ));
            }
            config.staging.poll_interval_ms = ms;
        }
        if let Some(v) = section.get("consumers") {
            let v = v.trim();
            let n: usize = v
                .parse()
                .map_err(|_| invalid("staging", "consumers", v, "must be a whole number"))?;
            config.staging.consumers = clamp_consumers(n);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: impl ToString) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_full_staging_section() {
        let config = load(
            r#"
[staging]
directory = /mnt/ramdisk/stage
budget_limit = 4GB
poll_interval_ms = 100
consumers = 3

[logging]
file = /var/log/stagecache.log
"#,
        )
        .unwrap();

        assert_eq!(config.staging.directory, PathBuf::from("/mnt/ramdisk/stage"));
        assert_eq!(config.staging.budget_limit, Some(4 * 1024 * 1024 * 1024));
        assert_eq!(config.staging.poll_interval_ms, 100);
        assert_eq!(config.staging.consumers, 3);
        assert_eq!(config.logging.file, PathBuf::from("/var/log/stagecache.log"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load("[staging]\nconsumers = 2\n").unwrap();

        assert_eq!(config.staging.consumers, 2);
        assert_eq!(config.staging.directory, default_staging_dir());
        assert_eq!(config.staging.budget_limit, None);
        assert_eq!(config.staging.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_empty_budget_limit_means_unlimited() {
        let config = load("[staging]\nbudget_limit =\n").unwrap();
        assert_eq!(config.staging.budget_limit, None);
    }

    #[test]
    fn test_invalid_budget_limit() {
        let err = load("[staging]\nbudget_limit = 2TB\n").unwrap_err();
        assert!(err.to_string().contains("budget_limit"));

        let err = load("[staging]\nbudget_limit = 0\n").unwrap_err();
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_invalid_poll_interval() {
        let err = load("[staging]\npoll_interval_ms = fast\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "poll_interval_ms"
        ));

        assert!(load("[staging]\npoll_interval_ms = 0\n").is_err());
    }

    #[test]
    fn test_poll_interval_upper_bound() {
        let config = load(&format!(
            "[staging]\npoll_interval_ms = {}\n",
            MAX_POLL_INTERVAL_MS
        ))
        .unwrap();
        assert_eq!(config.staging.poll_interval_ms, MAX_POLL_INTERVAL_MS);

        let err = load("[staging]\npoll_interval_ms = 18446744073709551615\n").unwrap_err();
        assert!(err.to_string().contains("must be at most"));
    }

    #[test]
    fn test_consumers_clamped() {
        let config = load("[staging]\nconsumers = 0\n").unwrap();
        assert_eq!(config.staging.consumers, 1);

        let config = load("[staging]\nconsumers = 500\n").unwrap();
        assert_eq!(config.staging.consumers, MAX_CONSUMERS);

        assert!(load("[staging]\nconsumers = -1\n").is_err());
    }

    #[test]
    fn test_unknown_sections_ignored() {
        let config = load("[legacy]\nkey = value\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/stage/dir");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, home.join("stage/dir"));
        }

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }
}
