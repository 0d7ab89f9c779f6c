//! Optics model for focus stacking
//!
//! Pure functions for depth of field, stacking increment, shot count and
//! hyperfocal distance, plus [`ShotPlan`] which derives a complete stacking
//! plan from the lens and subject parameters. All lengths are millimeters.
//!
//! Rounding precision is fixed because it feeds directly into the shot
//! count, and therefore into shoot duration and stage wear.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Decimal places kept for depth of field
pub const DOF_PRECISION: i32 = 3;
/// Decimal places kept for the stacking increment
pub const INCREMENT_PRECISION: i32 = 2;
/// Decimal places kept for the hyperfocal distance
pub const HYPERFOCAL_PRECISION: i32 = 3;
/// Fraction of the depth of field travelled between exposures
pub const OVERLAP_FACTOR: f64 = 0.8;
/// Extra exposures added to over-cover both ends of the subject
pub const MARGIN_SHOTS: u32 = 2;
/// Largest number of increment spans a plan may cover
pub const MAX_SPANS: u32 = u32::MAX - MARGIN_SHOTS;
/// Circle of confusion used when none is supplied
pub const DEFAULT_CIRCLE_OF_CONFUSION_MM: f64 = 0.011;
/// Circle of confusion matching the Canon R5 pixel pitch
pub const R5_CIRCLE_OF_CONFUSION_MM: f64 = 0.00439;

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Depth of field for a subject at `distance`
///
/// `2 * distance^2 * f_stop * coc / focal_length^2`, rounded to
/// [`DOF_PRECISION`] decimals.
pub fn depth_of_field(
    distance: f64,
    f_stop: f64,
    focal_length: f64,
    circle_of_confusion: f64,
) -> f64 {
    let dof = (2.0 * distance.powi(2) * f_stop * circle_of_confusion) / focal_length.powi(2);
    round_to(dof, DOF_PRECISION)
}

/// Stage travel between consecutive exposures (80% overlap)
pub fn stacking_increment(depth_of_field: f64) -> f64 {
    round_to(depth_of_field * OVERLAP_FACTOR, INCREMENT_PRECISION)
}

/// Whole increment spans in `subject_length`, before the margin is added
pub fn span_count(subject_length: f64, stacking_increment: f64) -> f64 {
    (subject_length / stacking_increment).floor()
}

/// Number of exposures needed to cover `subject_length`
///
/// Saturates at `u32::MAX`; [`ShotPlan::validate`] rejects plans whose span
/// count exceeds [`MAX_SPANS`].
pub fn shot_count(subject_length: f64, stacking_increment: f64) -> u32 {
    (span_count(subject_length, stacking_increment) as u32).saturating_add(MARGIN_SHOTS)
}

/// Hyperfocal distance for the lens at `f_stop`
pub fn hyperfocal_distance(focal_length: f64, f_stop: f64, circle_of_confusion: f64) -> f64 {
    round_to(
        focal_length.powi(2) / (circle_of_confusion * f_stop),
        HYPERFOCAL_PRECISION,
    )
}

/// Direction of stage travel along the travel axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Positive axis direction (+1)
    #[default]
    Positive,
    /// Negative axis direction (-1)
    Negative,
}

impl Direction {
    /// Sign applied to the stacking increment
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }

    /// Opposite direction
    pub fn reversed(&self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Positive => write!(f, "+"),
            Direction::Negative => write!(f, "-"),
        }
    }
}

/// Optical and geometric parameters for one stacking sequence
///
/// Created per planning round and treated as immutable once sequencing
/// starts. Call [`ShotPlan::validate`] before handing a plan to hardware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotPlan {
    /// Lens focal length (mm)
    pub focal_length: f64,
    /// Aperture f-number
    pub f_stop: f64,
    /// Distance from the lens to the leading edge of the subject (mm)
    pub subject_distance: f64,
    /// Length of the subject along the travel axis (mm)
    pub subject_length: f64,
    /// Direction the stage travels between shots
    #[serde(default)]
    pub direction: Direction,
    /// Sensor circle of confusion (mm)
    #[serde(default = "default_circle_of_confusion")]
    pub circle_of_confusion: f64,
}

fn default_circle_of_confusion() -> f64 {
    DEFAULT_CIRCLE_OF_CONFUSION_MM
}

impl ShotPlan {
    /// Create a plan using the default circle of confusion
    pub fn new(
        focal_length: f64,
        f_stop: f64,
        subject_distance: f64,
        subject_length: f64,
        direction: Direction,
    ) -> Self {
        Self {
            focal_length,
            f_stop,
            subject_distance,
            subject_length,
            direction,
            circle_of_confusion: DEFAULT_CIRCLE_OF_CONFUSION_MM,
        }
    }

    /// Override the circle of confusion
    pub fn with_circle_of_confusion(mut self, circle_of_confusion: f64) -> Self {
        self.circle_of_confusion = circle_of_confusion;
        self
    }

    /// Reject parameters that cannot produce a sequence
    pub fn validate(&self) -> Result<(), PlanError> {
        let checks = [
            ("focal_length", self.focal_length),
            ("f_stop", self.f_stop),
            ("subject_distance", self.subject_distance),
            ("subject_length", self.subject_length),
            ("circle_of_confusion", self.circle_of_confusion),
        ];
        for (name, value) in checks {
            if !value.is_finite() {
                return Err(PlanError::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite",
                });
            }
            if value <= 0.0 {
                return Err(PlanError::InvalidParameter {
                    name,
                    value,
                    reason: "must be greater than zero",
                });
            }
        }

        if self.stacking_increment() <= 0.0 {
            return Err(PlanError::ZeroIncrement {
                depth_of_field: self.depth_of_field(),
            });
        }

        let spans = span_count(self.subject_length, self.stacking_increment());
        if spans > f64::from(MAX_SPANS) {
            return Err(PlanError::TooManyShots {
                spans,
                max: MAX_SPANS,
            });
        }

        Ok(())
    }

    /// Depth of field at the subject distance
    pub fn depth_of_field(&self) -> f64 {
        depth_of_field(
            self.subject_distance,
            self.f_stop,
            self.focal_length,
            self.circle_of_confusion,
        )
    }

    /// Stage travel between exposures (always positive)
    pub fn stacking_increment(&self) -> f64 {
        stacking_increment(self.depth_of_field())
    }

    /// Signed stage travel between exposures
    pub fn step(&self) -> f64 {
        self.direction.sign() * self.stacking_increment()
    }

    /// Number of exposures in the sequence
    pub fn shot_count(&self) -> u32 {
        shot_count(self.subject_length, self.stacking_increment())
    }

    /// Hyperfocal distance for this lens and aperture
    pub fn hyperfocal_distance(&self) -> f64 {
        hyperfocal_distance(self.focal_length, self.f_stop, self.circle_of_confusion)
    }

    /// Estimated wall-clock time for the whole sequence
    pub fn estimated_duration(&self, seconds_per_shot: f64) -> Duration {
        let seconds = (f64::from(self.shot_count()) * seconds_per_shot).round();
        Duration::from_secs_f64(seconds.max(0.0))
    }

    /// One-line operator summary of the plan
    pub fn summary(&self, seconds_per_shot: f64) -> String {
        format!(
            concat!(
                "Bed movement per shot = {}{:.2}mm  Number of shots = {}  DOF = {:.3}mm  ",
                "estimated time (HH:MM:SS) = {}"
            ),
            self.direction,
            self.stacking_increment(),
            self.shot_count(),
            self.depth_of_field(),
            format_hms(self.estimated_duration(seconds_per_shot))
        )
    }
}

impl fmt::Display for ShotPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FStop={} Lens_length={} distance_to_object={} subject_size={}",
            self.f_stop, self.focal_length, self.subject_distance, self.subject_length
        )
    }
}

/// Format a duration as `HH:MM:SS`
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
