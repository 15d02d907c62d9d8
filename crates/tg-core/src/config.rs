//! Tracker configuration
//!
//! Loaded from a JSON file; every field has a default so a missing or
//! partial file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{Classifier, ReferenceTables};
use crate::pipeline::DEFAULT_EXCLUDED_SCHEMES;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TrackerConfig {
    pub database_path: PathBuf,
    pub tld_risk_path: Option<PathBuf>,
    pub blocklist_paths: Vec<PathBuf>,
    pub excluded_schemes: Vec<String>,
    pub risky_tld_threshold: u8,
    pub extra_ad_keywords: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("tracker.db"),
            tld_risk_path: None,
            blocklist_paths: Vec::new(),
            excluded_schemes: DEFAULT_EXCLUDED_SCHEMES.iter().map(|s| s.to_string()).collect(),
            risky_tld_threshold: Classifier::DEFAULT_RISKY_TLD_THRESHOLD,
            extra_ad_keywords: Vec::new(),
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Build the classifier these settings describe.
    pub fn classifier(&self, tables: ReferenceTables) -> Classifier {
        Classifier::new(tables)
            .with_extra_keywords(&self.extra_ad_keywords)
            .with_risky_tld_threshold(self.risky_tld_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"database_path": "/tmp/t.db", "extra_ad_keywords": ["telemetry"]}"#)
                .expect("parse");
        assert_eq!(config.database_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.risky_tld_threshold, 7);
        assert!(config.excluded_schemes.iter().any(|s| s == "about"));
        assert!(config.classifier(ReferenceTables::new()).looks_like_ad("telemetry.app.io"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TrackerConfig::load(Path::new("/nonexistent/tg-config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_or_default() {
        assert_eq!(TrackerConfig::load_or_default(None).expect("default"), TrackerConfig::default());
    }
}
