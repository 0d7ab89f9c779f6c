//! Configuration and settings management for StackShot
//!
//! Provides configuration file handling, defaults, and validation.
//! Supports JSON and TOML file formats stored in the platform config
//! directory.
//!
//! Configuration is organized into logical sections:
//! - Stage settings (serial port, timing, staging position, feed rate)
//! - Camera settings (base URL, timeouts, busy retry policy)
//! - Acquisition settings (optics defaults, settle delays)

use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use stackshot_core::{Axis, PartialPosition, DEFAULT_CIRCLE_OF_CONFUSION_MM};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Absolute position the stage is moved to before the origin is set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StagingPosition {
    /// X coordinate (mm)
    pub x: f64,
    /// Y coordinate (mm)
    pub y: f64,
    /// Z coordinate (mm); keeps the vertical rail clear of the subject
    pub z: f64,
}

impl Default for StagingPosition {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 120.0,
            z: 190.0,
        }
    }
}

impl From<StagingPosition> for PartialPosition {
    fn from(pos: StagingPosition) -> Self {
        PartialPosition::xyz(pos.x, pos.y, pos.z)
    }
}

/// Stage connection and motion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Serial port of the printer board
    pub port: String,
    /// Baud rate for the serial connection
    pub baud_rate: u32,
    /// Pause after each command write in milliseconds
    pub write_settle_ms: u64,
    /// Pause after opening the port while the board resets, in milliseconds
    pub startup_delay_ms: u64,
    /// Skip the Z axis when homing
    pub home_ignores_z: bool,
    /// Absolute staging position
    pub staging: StagingPosition,
    /// Feed rate for shot moves in mm/min
    pub feed_rate: f64,
    /// Axis the stage travels along between shots
    pub travel_axis: Axis,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 256_000,
            write_settle_ms: 400,
            startup_delay_ms: 5000,
            home_ignores_z: true,
            staging: StagingPosition::default(),
            feed_rate: 120.0,
            travel_axis: Axis::Y,
        }
    }
}

impl StageSettings {
    /// Pause after each command write
    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    /// Pause after opening the port
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

/// Camera connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Base URL of the camera control API
    pub base_url: String,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Delay between busy shutter retries in milliseconds
    pub busy_retry_delay_ms: u64,
    /// Cap on shutter press attempts (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_busy_attempts: Option<u32>,
    /// Pause after an accepted release in milliseconds
    pub release_settle_ms: u64,
    /// Autofocus on every press
    pub autofocus: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.1.188:8080".to_string(),
            connect_timeout_ms: 2000,
            read_timeout_ms: 5000,
            busy_retry_delay_ms: 150,
            max_busy_attempts: None,
            release_settle_ms: 400,
            autofocus: false,
        }
    }
}

impl CameraSettings {
    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Delay between busy retries
    pub fn busy_retry_delay(&self) -> Duration {
        Duration::from_millis(self.busy_retry_delay_ms)
    }

    /// Pause after an accepted release
    pub fn release_settle(&self) -> Duration {
        Duration::from_millis(self.release_settle_ms)
    }
}

/// Acquisition defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Sensor circle of confusion in mm
    pub circle_of_confusion_mm: f64,
    /// Pause before the final event drain in milliseconds
    pub event_settle_ms: u64,
    /// Increments to back off before the first shot
    pub lead_in_increments: u32,
    /// Seconds per shot used for duration estimates
    pub seconds_per_shot: f64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            circle_of_confusion_mm: DEFAULT_CIRCLE_OF_CONFUSION_MM,
            event_settle_ms: 1000,
            lead_in_increments: 0,
            seconds_per_shot: 1.1,
        }
    }
}

impl AcquisitionSettings {
    /// Pause before the final event drain
    pub fn event_settle(&self) -> Duration {
        Duration::from_millis(self.event_settle_ms)
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Stage settings
    pub stage: StageSettings,
    /// Camera settings
    pub camera: CameraSettings,
    /// Acquisition settings
    pub acquisition: AcquisitionSettings,
}

impl Config {
    /// Default config file location (`<config dir>/stackshot/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("stackshot").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Load `path` if given, else the default path if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)?
        } else {
            return Err(SettingsError::UnsupportedFormat(
                path.display().to_string(),
            ));
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)?
        } else {
            return Err(SettingsError::UnsupportedFormat(
                path.display().to_string(),
            ));
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
            }
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.stage.port.trim().is_empty() {
            return Err(SettingsError::invalid("stage.port", "must not be empty"));
        }
        if self.stage.baud_rate == 0 {
            return Err(SettingsError::invalid("stage.baud_rate", "must be greater than zero"));
        }
        if !(self.stage.feed_rate.is_finite() && self.stage.feed_rate > 0.0) {
            return Err(SettingsError::invalid("stage.feed_rate", "must be greater than zero"));
        }

        if self.camera.base_url.trim().is_empty() {
            return Err(SettingsError::invalid("camera.base_url", "must not be empty"));
        }
        if self.camera.connect_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "camera.connect_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.camera.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "camera.read_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.camera.max_busy_attempts == Some(0) {
            return Err(SettingsError::invalid(
                "camera.max_busy_attempts",
                "must allow at least one attempt",
            ));
        }

        let coc = self.acquisition.circle_of_confusion_mm;
        if !(coc.is_finite() && coc > 0.0) {
            return Err(SettingsError::invalid(
                "acquisition.circle_of_confusion_mm",
                "must be greater than zero",
            ));
        }
        let per_shot = self.acquisition.seconds_per_shot;
        if !(per_shot.is_finite() && per_shot > 0.0) {
            return Err(SettingsError::invalid(
                "acquisition.seconds_per_shot",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}
