//! Runtime configuration loaded from YAML
//!
//! Every field has a default, so an empty file (or no file) is valid.

use crate::{RessyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RessyncConfig {
    /// Seconds between two reconciliation cycles when running continuously
    pub cycle_interval_secs: u64,
    pub tag_recorder: TagRecorderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRecorderConfig {
    /// Maximum rows per store write
    #[serde(alias = "mysql_batch_size")]
    pub batch_size: usize,
    /// Re-project a whole table when a targeted update finds no row
    pub sync_on_missing: bool,
}

impl Default for RessyncConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 60,
            tag_recorder: TagRecorderConfig::default(),
        }
    }
}

impl Default for TagRecorderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            sync_on_missing: true,
        }
    }
}

impl RessyncConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: RessyncConfig = if raw.trim().is_empty() {
            RessyncConfig::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RessyncError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tag_recorder.batch_size == 0 {
            return Err(RessyncError::ConfigError(
                "tag_recorder.batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RessyncConfig::from_yaml_str("").unwrap();
        assert_eq!(config, RessyncConfig::default());
        assert_eq!(config.tag_recorder.batch_size, 1000);
        assert_eq!(config.cycle_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = RessyncConfig::from_yaml_str("tag_recorder:\n  batch_size: 10\n").unwrap();
        assert_eq!(config.tag_recorder.batch_size, 10);
        assert!(config.tag_recorder.sync_on_missing);
        assert_eq!(config.cycle_interval_secs, 60);
    }

    #[test]
    fn test_mysql_batch_size_alias() {
        let config =
            RessyncConfig::from_yaml_str("tag_recorder:\n  mysql_batch_size: 25\n").unwrap();
        assert_eq!(config.tag_recorder.batch_size, 25);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = RessyncConfig::from_yaml_str("tag_recorder:\n  batch_size: 0\n").unwrap_err();
        assert!(matches!(err, RessyncError::ConfigError(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cycle_interval_secs: 5").unwrap();

        let config = RessyncConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.cycle_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = RessyncConfig::from_file(Path::new("/nonexistent/ressync.yaml")).unwrap_err();
        assert!(matches!(err, RessyncError::ConfigError(_)));
    }
}
