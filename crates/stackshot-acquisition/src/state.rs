//! Sequence state machine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one acquisition run
///
/// `Idle → Homed → OriginSet → Sequencing → Reporting → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequenceState {
    /// No reference frame established
    #[default]
    Idle,
    /// Stage homed against its end stops
    Homed,
    /// Stage at the staging position with logical XY origin defined
    OriginSet,
    /// Moving and shooting
    Sequencing,
    /// Reconciling captures with the plan
    Reporting,
}

impl SequenceState {
    /// Check if a transition from this state to `target` is valid.
    ///
    /// - Homing is allowed whenever no sequence is in flight
    /// - The origin can be re-established after homing, and restored from
    ///   Idle by returning to it
    /// - Any state can fall back to Idle (completion or abort)
    pub fn can_transition_to(&self, target: SequenceState) -> bool {
        use SequenceState::*;
        match (self, target) {
            (_, Idle) => true,
            (Idle | Homed | OriginSet, Homed) => true,
            (Idle | Homed | OriginSet, OriginSet) => true,
            (OriginSet, Sequencing) => true,
            (Sequencing, Reporting) => true,
            _ => false,
        }
    }

    /// A sequence is in flight
    pub fn is_active(&self) -> bool {
        matches!(self, SequenceState::Sequencing | SequenceState::Reporting)
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Homed => write!(f, "Homed"),
            Self::OriginSet => write!(f, "OriginSet"),
            Self::Sequencing => write!(f, "Sequencing"),
            Self::Reporting => write!(f, "Reporting"),
        }
    }
}
