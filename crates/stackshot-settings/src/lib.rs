//! StackShot Settings Crate
//!
//! Handles application configuration: device connection parameters,
//! timing constants and acquisition defaults.

pub mod config;
pub mod error;

pub use config::{AcquisitionSettings, CameraSettings, Config, StageSettings, StagingPosition};
pub use error::{SettingsError, SettingsResult};
