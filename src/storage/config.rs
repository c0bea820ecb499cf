//! Application configuration.
//!
//! Loaded from `config.toml` in the platform data directory. Every section
//! and key is optional; missing values fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::load::types::LoadSource;
use crate::metrics::acwr::{DEFAULT_ACUTE_HALF_LIFE, DEFAULT_CHRONIC_HALF_LIFE};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data directory (resolved at load time, not persisted)
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub storage: StorageSettings,
    pub acwr: AcwrSettings,
    pub batch: BatchSettings,
}

impl AppConfig {
    /// Absolute path of the database file.
    pub fn database_path(&self) -> PathBuf {
        let file = Path::new(&self.storage.database_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, half_life) in [
            ("acwr.acute_half_life_days", self.acwr.acute_half_life_days),
            ("acwr.chronic_half_life_days", self.acwr.chronic_half_life_days),
        ] {
            if !half_life.is_finite() || half_life <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive number of days, got {}",
                    key, half_life
                )));
            }
        }
        if self.acwr.chunk_days == 0 {
            return Err(ConfigError::Invalid(
                "acwr.chunk_days must be at least 1".to_string(),
            ));
        }
        if self.acwr.sources.is_empty() {
            return Err(ConfigError::Invalid(
                "acwr.sources must name at least one source".to_string(),
            ));
        }
        if self.batch.max_parallel_athletes == 0 {
            return Err(ConfigError::Invalid(
                "batch.max_parallel_athletes must be at least 1".to_string(),
            ));
        }
        if self.batch.interval_hours == 0 {
            return Err(ConfigError::Invalid(
                "batch.interval_hours must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file name, relative to the data directory unless absolute
    pub database_file: String,
    /// How long a writer waits for a locked database, in milliseconds
    pub busy_timeout_ms: u64,
}

impl StorageSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_file: "loadwatch.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// ACWR engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcwrSettings {
    /// Acute load half-life in days
    pub acute_half_life_days: f64,
    /// Chronic load half-life in days
    pub chronic_half_life_days: f64,
    /// Days written per snapshot transaction
    pub chunk_days: u32,
    /// Days from the start of a range before its ratios are trusted
    pub warm_up_days: u32,
    /// Sources computed by batch runs
    pub sources: Vec<LoadSource>,
}

impl Default for AcwrSettings {
    fn default() -> Self {
        Self {
            acute_half_life_days: DEFAULT_ACUTE_HALF_LIFE,
            chronic_half_life_days: DEFAULT_CHRONIC_HALF_LIFE,
            chunk_days: 31,
            warm_up_days: 28,
            sources: vec![LoadSource::Internal],
        }
    }
}

/// Batch and scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Athletes processed concurrently
    pub max_parallel_athletes: usize,
    /// Days before today that each scheduled run starts from
    pub lookback_days: u32,
    /// Hours between scheduled runs
    pub interval_hours: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_parallel_athletes: 4,
            lookback_days: 90,
            interval_hours: 24,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "loadwatch", "Loadwatch")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load application configuration from a file.
///
/// A missing file yields the defaults. The data directory is the file's
/// parent directory.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let data_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(get_data_dir);

    if !path.exists() {
        let config = AppConfig {
            data_dir,
            ..Default::default()
        };
        return Ok(config);
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = data_dir;
    config.validate()?;

    Ok(config)
}

/// Save application configuration to a file.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
