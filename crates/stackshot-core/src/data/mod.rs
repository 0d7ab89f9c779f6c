//! Data models for stage positions and axes
//!
//! This module provides:
//! - Stage position snapshots parsed from the firmware status report
//! - Partial positions used to build move and redefine commands
//! - Axis and unit enumerations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage coordinate units (millimeters or inches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Units {
    /// Millimeters (metric)
    #[default]
    MM,
    /// Inches (imperial)
    INCH,
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::MM => write!(f, "mm"),
            Units::INCH => write!(f, "in"),
        }
    }
}

/// A single linear axis of the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// X axis (gantry)
    X,
    /// Y axis (bed travel on a bed-slinger printer)
    Y,
    /// Z axis (vertical rail)
    Z,
}

impl Axis {
    /// G-code word letter for this axis
    pub fn letter(&self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Read-only snapshot of the stage position in millimeters.
///
/// Never cached: every snapshot comes from a fresh status query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StagePosition {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
}

impl StagePosition {
    /// Create a new position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinate along one axis
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl fmt::Display for StagePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={:.2} y={:.2} z={:.2}", self.x, self.y, self.z)
    }
}

/// Partial position for selective axis updates
///
/// Only axes set to `Some` are emitted into the generated command, so a
/// move along Y leaves X and Z untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialPosition {
    /// X-axis position (if Some, update this axis)
    pub x: Option<f64>,
    /// Y-axis position (if Some, update this axis)
    pub y: Option<f64>,
    /// Z-axis position (if Some, update this axis)
    pub z: Option<f64>,
}

impl PartialPosition {
    /// Create a new empty partial position (all axes None)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a partial position with a single axis set
    pub fn along(axis: Axis, value: f64) -> Self {
        Self::default().with(axis, value)
    }

    /// Create a partial position with XY axes set
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: None,
        }
    }

    /// Create a partial position with XYZ axes set
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Set one axis, returning the updated position
    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        match axis {
            Axis::X => self.x = Some(value),
            Axis::Y => self.y = Some(value),
            Axis::Z => self.z = Some(value),
        }
        self
    }

    /// Axes that are set, in X, Y, Z order
    pub fn axes(&self) -> impl Iterator<Item = (Axis, f64)> {
        [(Axis::X, self.x), (Axis::Y, self.y), (Axis::Z, self.z)]
            .into_iter()
            .filter_map(|(axis, value)| value.map(|v| (axis, v)))
    }

    /// Check if no axis is set
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }
}
