//! Outcome of a completed acquisition run

use chrono::{DateTime, Utc};
use serde::Serialize;
use stackshot_core::{format_hms, StagePosition};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Result of one sequence run
///
/// A mismatch between requested shots and files the camera reported is not
/// an error; it is surfaced through [`SequenceResult::discrepancy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceResult {
    /// Unique id of this run
    pub run_id: Uuid,
    /// When the sequence started
    pub started_at: DateTime<Utc>,
    /// Shots the plan asked for
    pub requested_shots: u32,
    /// Resource paths the camera reported as added during the run
    pub captured_files: Vec<String>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Press/release pairs the camera accepted
    pub shots_fired: u32,
    /// Press attempts rejected as busy, summed over the run
    pub busy_retries: u32,
    /// Stage position after the last shot, if it could be read
    pub final_position: Option<StagePosition>,
}

impl SequenceResult {
    /// Requested shots minus reported captures
    pub fn discrepancy(&self) -> i64 {
        i64::from(self.requested_shots) - self.captured_files.len() as i64
    }

    /// Every requested shot was reported by the camera
    pub fn is_reconciled(&self) -> bool {
        self.discrepancy() == 0
    }
}

impl fmt::Display for SequenceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run {}: {}/{} files captured in {} ({} busy retries)",
            self.run_id,
            self.captured_files.len(),
            self.requested_shots,
            format_hms(self.elapsed),
            self.busy_retries
        )?;
        if !self.is_reconciled() {
            write!(f, ", discrepancy {}", self.discrepancy())?;
        }
        Ok(())
    }
}
