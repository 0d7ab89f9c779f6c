//! # StackShot Acquisition
//!
//! Runs a focus-stacking sequence: homes the stage, establishes the logical
//! origin, then alternates stage moves and shutter releases before
//! reconciling the camera's reported captures against the plan.

pub mod archive;
pub mod error;
pub mod orchestrator;
pub mod result;
pub mod state;

pub use archive::{ArchiveOutcome, ArchiveReport, ImageArchive};
pub use error::{SequenceAbort, SequenceStep};
pub use orchestrator::{AcquisitionOrchestrator, SequenceOptions};
pub use result::SequenceResult;
pub use state::SequenceState;
