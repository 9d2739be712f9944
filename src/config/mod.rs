//! Configuration management for PasteSync
//!
//! This module handles loading, validating, and managing configuration
//! for the PasteSync service, plus the small runtime state file that
//! survives restarts (the last observed clipboard change counter).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Runtime state file parsing error
    #[error("Failed to parse state file: {0}")]
    State(#[from] serde_json::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Device ID (generated if not specified)
    #[serde(default = "generate_device_id")]
    pub device_id: uuid::Uuid,

    /// Name advertised to peers
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Directory for the record database, chunk scratch space and
    /// runtime state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Whether the clipboard watcher runs at all
    #[serde(default = "default_true")]
    pub listening_enabled: bool,

    /// Skip whatever is on the clipboard when the watcher starts
    #[serde(default = "default_true")]
    pub skip_prior_clipboard_content: bool,

    /// Produce single-representation payloads for peers that cannot
    /// handle multi-format records
    #[serde(default)]
    pub legacy_compatibility_mode: bool,

    /// Watcher tuning
    #[serde(default)]
    pub watcher: WatcherTuning,

    /// File transfer tuning
    #[serde(default)]
    pub transfer: TransferTuning,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Clipboard watcher tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherTuning {
    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Minimum time spent capturing the source application before the
    /// clipboard content is fetched, in milliseconds
    #[serde(default = "default_min_source_app_ms")]
    pub min_source_app_time_ms: u64,

    /// Maximum inline payload size in bytes
    #[serde(default = "default_max_payload")]
    pub max_payload_size: usize,
}

/// File transfer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferTuning {
    /// Chunk size in bytes for file transfers
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Number of per-peer chunk indexes kept in memory
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Seconds a cached chunk index stays valid
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

// Default value functions
fn default_device_name() -> String {
    gethostname::gethostname().to_string_lossy().to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.local/share/pastesync")
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_min_source_app_ms() -> u64 {
    50
}

fn default_max_payload() -> usize {
    crate::MAX_PAYLOAD_SIZE
}

fn default_chunk_size() -> usize {
    1_048_576 // 1MB
}

fn default_cache_capacity() -> usize {
    64
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn generate_device_id() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}

impl Default for WatcherTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            min_source_app_time_ms: default_min_source_app_ms(),
            max_payload_size: default_max_payload(),
        }
    }
}

impl Default for TransferTuning {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: generate_device_id(),
            device_name: default_device_name(),
            data_dir: default_data_dir(),
            listening_enabled: true,
            skip_prior_clipboard_content: true,
            legacy_compatibility_mode: false,
            watcher: WatcherTuning::default(),
            transfer: TransferTuning::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Checks in order:
    /// 1. Path from PASTESYNC_CONFIG environment variable
    /// 2. ~/.config/pastesync/config.toml
    /// 3. Defaults if none exists
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = Self::find_config_path() {
            Self::load_from_path(&path)
        } else {
            let mut config = Self::default();
            config.expand_paths();
            Ok(config)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml_str)?;
        config.expand_paths();
        config.validate_config()?;
        Ok(config)
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PASTESYNC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        dirs::config_dir()
            .map(|p| p.join("pastesync").join("config.toml"))
            .filter(|p| p.exists())
    }

    fn expand_paths(&mut self) {
        self.data_dir = expand_path(&self.data_dir);
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        if self.watcher.poll_interval_ms < 20 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be at least 20".to_string(),
            ));
        }
        if self.transfer.chunk_size < 4096 {
            return Err(ConfigError::Validation(
                "chunk_size must be at least 4096 bytes".to_string(),
            ));
        }
        if self.transfer.cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.watcher.max_payload_size < 1024 {
            return Err(ConfigError::Validation(
                "max_payload_size must be at least 1024 bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not find config directory",
                ))
            })?
            .join("pastesync");

        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        std::fs::write(config_path, toml_string)?;
        Ok(())
    }

    /// Path of the record database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("records.db")
    }

    /// Path of the trust registry file
    pub fn trust_path(&self) -> PathBuf {
        self.data_dir.join("trust.json")
    }

    /// Directory where staged clipboard images are written
    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join("scratch")
    }

    /// Path of the runtime state file
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

/// Runtime state persisted across restarts
///
/// Kept separate from the TOML config so that writes on every shutdown
/// never clobber user-edited settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeState {
    /// Change counter of the last clipboard content the watcher saw.
    /// Used with `skip_prior_clipboard_content` so a restart does not
    /// re-ingest content from a previous session.
    pub last_change_count: Option<u64>,
}

impl RuntimeState {
    /// Load runtime state; a missing file yields the default
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Expand tilde in path
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(path_str.as_ref());
    PathBuf::from(expanded.into_owned())
}
