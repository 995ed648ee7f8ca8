//! # Configuration Management Module
//!
//! Persistent monitor settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Sections
//! - `sampling`: tick period and the sensor's input pin
//! - `detector`: amplitude threshold (carried, not yet applied)
//! - `reporting`: interval between readings and the startup mode
//! - `server`: collector address and response timeouts; omit to only log
//! - `source`: where samples come from when no sensor is attached
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/pulse-relay/config.toml
//! - Linux: ~/.config/pulse-relay/config.toml
//! - Windows: %APPDATA%\pulse-relay\config.toml

use crate::clock::Millis;
use crate::error::ConfigError;
use crate::estimator::{EstimatorMode, REPORT_INTERVAL_MS};
use crate::reporter::FetchPolicy;
use crate::window::Sample;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub detector: DetectorConfig,
    pub reporting: ReportingConfig,
    /// Missing section means readings are only logged
    #[serde(default)]
    pub server: Option<ServerConfig>,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub tick_ms: Millis,
    pub sensor_pin: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_height: Sample,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub interval_ms: Millis,
    pub mode: EstimatorMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub inactivity_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub link_retry_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Synthetic {
        bpm: u32,
        baseline: Sample,
        amplitude: Sample,
    },
    Replay {
        path: PathBuf,
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

fn default_scale() -> f64 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            detector: DetectorConfig::default(),
            reporting: ReportingConfig::default(),
            server: Some(ServerConfig::default()),
            source: SourceConfig::default(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 20,
            sensor_pin: 33,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { min_height: 2750 }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval_ms: REPORT_INTERVAL_MS,
            mode: EstimatorMode::Immediate,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "35.160.204.3".to_string(),
            port: 3001,
            inactivity_timeout_ms: 30_000,
            poll_interval_ms: 1_000,
            link_retry_ms: 500,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Synthetic {
            bpm: 72,
            baseline: 1800,
            amplitude: 1200,
        }
    }
}

impl ServerConfig {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            inactivity_timeout: Duration::from_millis(self.inactivity_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn link_retry(&self) -> Duration {
        Duration::from_millis(self.link_retry_ms)
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulse-relay")
            .join("config.toml")
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Load config from `path`, or write and return defaults if it doesn't exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }
}
