// Application configuration
// JSON file with storage, ingest, detector and event definition sections

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::events::{DetectorThresholds, EventDefinitions, EventDetector, EventKind};
use crate::state::storage::{default_config_path, StorageError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event definitions with min_value >= max_value: {0:?}")]
    InvalidDefinitions(Vec<EventKind>),

    #[error("Invalid ingest setting: {0}")]
    InvalidIngest(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; the app data directory is used when unset
    pub db_path: Option<PathBuf>,

    /// Directory for pipeline trace files; no tracing when unset
    pub trace_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Rows per writer transaction
    pub batch_size: usize,

    /// Batches the parser may queue ahead of the writer
    pub queue_capacity: usize,

    /// Number of progress trace entries over the file
    pub progress_increments: u32,

    pub delimiter: char,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            batch_size: 1000,
            queue_capacity: 16,
            progress_increments: 100,
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub detector: DetectorThresholds,
    pub definitions: EventDefinitions,
}

impl AppConfig {
    /// Load from `path`, or from `config.json` in the app data directory
    /// A missing file gives the defaults
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }

        let contents = fs::read_to_string(&path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        config.validate()?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = self.definitions.invalid_kinds();
        if !invalid.is_empty() {
            return Err(ConfigError::InvalidDefinitions(invalid));
        }
        if self.ingest.batch_size == 0 || self.ingest.queue_capacity == 0 {
            return Err(ConfigError::InvalidIngest(
                "batch_size and queue_capacity must be positive".to_string(),
            ));
        }
        if !self.ingest.delimiter.is_ascii() {
            return Err(ConfigError::InvalidIngest(format!(
                "delimiter {:?} is not a single byte",
                self.ingest.delimiter
            )));
        }
        Ok(())
    }

    /// Detector built from the configured definitions and thresholds
    pub fn detector(&self) -> EventDetector {
        EventDetector::new(self.definitions.clone(), self.detector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load(Some(&temp_dir.path().join("none.json"))).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.ingest.batch_size, 1000);
        assert_eq!(config.detector.touchdown_hold_ticks, 150_000);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"ingest": {"batch_size": 50}, "detector": {"gear_down": 0.8}}"#)
            .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.ingest.batch_size, 50);
        assert_eq!(config.ingest.queue_capacity, 16);
        assert_eq!(config.detector.gear_down, 0.8);
        assert_eq!(config.detector.flap_partial, 0.5);
        assert_eq!(config.definitions, EventDefinitions::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.ingest.delimiter = ';';
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_malformed_and_invalid_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(Some(&path)), Err(ConfigError::Parse(_))));

        fs::write(&path, r#"{"ingest": {"batch_size": 0}}"#).unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::InvalidIngest(_))
        ));
    }
}
