//! Sequence abort reporting
//!
//! An aborted run reports which step failed together with the partial state
//! already reached, so the operator can resume by hand.

use stackshot_core::{Error, StagePosition};
use std::fmt;
use thiserror::Error;

/// Step of an acquisition run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    /// Checking the plan and the orchestrator state
    Validate,
    /// Homing the stage
    Home,
    /// Moving to the staging position and defining the origin
    EstablishOrigin,
    /// Backing off before the first shot
    LeadIn,
    /// Clearing stale camera events
    DrainStaleEvents,
    /// Moving before the given shot (1-based)
    Move(u32),
    /// Firing the given shot (1-based)
    Shutter(u32),
    /// Draining the events for reconciliation
    Reconcile,
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validation"),
            Self::Home => write!(f, "homing"),
            Self::EstablishOrigin => write!(f, "origin setup"),
            Self::LeadIn => write!(f, "lead-in move"),
            Self::DrainStaleEvents => write!(f, "stale event drain"),
            Self::Move(shot) => write!(f, "move before shot {}", shot),
            Self::Shutter(shot) => write!(f, "shutter for shot {}", shot),
            Self::Reconcile => write!(f, "reconciliation"),
        }
    }
}

/// A run that stopped before completion
#[derive(Debug, Error)]
#[error(
    "Sequence aborted during {step} after {shots_fired} shot(s), offset {logical_offset_mm:.2} mm: {source}"
)]
pub struct SequenceAbort {
    /// Step that failed
    pub step: SequenceStep,
    /// Exposures completed before the failure
    pub shots_fired: u32,
    /// Travel from the logical origin along the travel axis
    pub logical_offset_mm: f64,
    /// Stage position, if it could still be queried
    pub position: Option<StagePosition>,
    /// Underlying failure
    pub source: Error,
}

impl SequenceAbort {
    /// Abort before any motion of the run
    pub fn at(step: SequenceStep, source: impl Into<Error>) -> Self {
        Self {
            step,
            shots_fired: 0,
            logical_offset_mm: 0.0,
            position: None,
            source: source.into(),
        }
    }

    /// Operator-facing description of where the stage was left
    pub fn resume_hint(&self) -> String {
        match self.position {
            Some(pos) => format!(
                "{} shot(s) taken; stage at {} ({:+.2} mm from origin)",
                self.shots_fired, pos, self.logical_offset_mm
            ),
            None => format!(
                "{} shot(s) taken; stage position unknown ({:+.2} mm from origin expected)",
                self.shots_fired, self.logical_offset_mm
            ),
        }
    }
}
