//! Runtime configuration resolved from the environment.
//!
//! Recognized variables:
//! - `FOLIO_DB_PATH`: catalog database file.
//! - `FOLIO_LOG_LEVEL`: `trace|debug|info|warn|error`.
//! - `FOLIO_LOG_DIR`: absolute directory for rolling log files; unset
//!   disables file logging.
//!
//! Empty values count as unset. Front-ends may override any field after
//! loading.

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "FOLIO_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "FOLIO_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "FOLIO_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "folio.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl FolioConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            db_path: read(DB_PATH_ENV).map_or(defaults.db_path, PathBuf::from),
            log_level: read(LOG_LEVEL_ENV).unwrap_or(defaults.log_level),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FolioConfig, DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(pairs: &[(&str, &str)]) -> FolioConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        FolioConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_environment_yields_defaults() {
        assert_eq!(config_from(&[]), FolioConfig::default());
    }

    #[test]
    fn environment_values_override_defaults() {
        let config = config_from(&[
            (DB_PATH_ENV, "/var/lib/folio/catalog.db"),
            (LOG_LEVEL_ENV, "warn"),
            (LOG_DIR_ENV, "/var/log/folio"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/folio/catalog.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/folio")));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[(LOG_DIR_ENV, "  "), (LOG_LEVEL_ENV, "")]);
        assert_eq!(config.log_dir, None);
        assert_eq!(config.log_level, FolioConfig::default().log_level);
    }
}
