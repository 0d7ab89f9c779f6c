//! # StackShot
//!
//! Automated focus-stacking photography. A repurposed 3D printer bed
//! (Marlin firmware over USB serial) carries the subject through the focal
//! plane in fixed increments while a network-controlled camera takes one
//! exposure per increment.
//!
//! ## Architecture
//!
//! StackShot is organized as a workspace with multiple crates:
//!
//! 1. **stackshot-core** - Errors, stage positions, depth-of-field model
//! 2. **stackshot-communication** - Stage and camera links, device simulators
//! 3. **stackshot-settings** - Configuration file handling
//! 4. **stackshot-acquisition** - Sequence orchestration and image archiving
//! 5. **stackshot** - Command-line binary that ties the crates together

pub mod devices;

pub use stackshot_acquisition::{
    AcquisitionOrchestrator, ArchiveReport, ImageArchive, SequenceAbort, SequenceOptions,
    SequenceResult, SequenceState, SequenceStep,
};

pub use stackshot_communication::{
    BusyRetryPolicy, CameraLink, DeviceJournal, HttpCameraTransport, RealSerialPort,
    SimulatedCamera, SimulatedStagePort, StageLink,
};

pub use stackshot_core::{
    Axis, CameraError, Direction, Error, LinkError, PlanError, ProtocolError, Result, ShotPlan,
    StagePosition,
};

pub use stackshot_settings::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support (defaults to `info`)
/// - Human-readable output, or one JSON object per line when `json` is set
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_level(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
