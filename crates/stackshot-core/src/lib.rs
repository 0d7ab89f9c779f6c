//! # StackShot Core
//!
//! Core types, errors, and the optics model for StackShot.
//! Provides the stage position types shared by the device links and the
//! pure depth-of-field arithmetic that turns lens parameters into a
//! stacking plan.

pub mod data;
pub mod error;
pub mod optics;

pub use data::{Axis, PartialPosition, StagePosition, Units};

pub use error::{
    CameraError, ControllerError, Error, LinkError, PlanError, ProtocolError, Result,
};

pub use optics::{
    depth_of_field, format_hms, hyperfocal_distance, shot_count, span_count, stacking_increment,
    Direction, ShotPlan, DEFAULT_CIRCLE_OF_CONFUSION_MM, MARGIN_SHOTS, MAX_SPANS,
    R5_CIRCLE_OF_CONFUSION_MM,
};
