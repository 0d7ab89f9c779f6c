//! Acquisition orchestrator
//!
//! Owns the stage and camera links for the lifetime of a run and drives
//! them strictly one call at a time. Each shot is a completed move (the
//! motion buffer drained) followed by a completed shutter release; the next
//! move is never issued while the camera call is outstanding.
//!
//! Only the camera's busy condition is retried, inside [`CameraLink`]. Any
//! other failure aborts the run and is reported as a [`SequenceAbort`].

use crate::error::{SequenceAbort, SequenceStep};
use crate::result::SequenceResult;
use crate::state::SequenceState;
use chrono::Utc;
use stackshot_communication::{CameraLink, CameraTransport, StageLink, StagePort};
use stackshot_core::{
    Axis, CameraError, ControllerError, Error, PartialPosition, Result, ShotPlan, StagePosition,
};
use stackshot_settings::Config;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Tunables for a run, usually taken from [`Config`]
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceOptions {
    /// Leave the Z axis alone when homing
    pub home_ignores_z: bool,
    /// Absolute position to move to before defining the origin
    pub staging: PartialPosition,
    /// Feed rate for shot moves in mm/min
    pub feed_rate: f64,
    /// Axis the stage travels along between shots
    pub travel_axis: Axis,
    /// Autofocus on every press
    pub autofocus: bool,
    /// Pause before the final event drain
    pub event_settle: Duration,
    /// Increments to back off before the first shot
    pub lead_in_increments: u32,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            home_ignores_z: true,
            staging: PartialPosition::xyz(0.0, 120.0, 190.0),
            feed_rate: 120.0,
            travel_axis: Axis::Y,
            autofocus: false,
            event_settle: Duration::from_millis(1000),
            lead_in_increments: 0,
        }
    }
}

impl From<&Config> for SequenceOptions {
    fn from(config: &Config) -> Self {
        Self {
            home_ignores_z: config.stage.home_ignores_z,
            staging: config.stage.staging.into(),
            feed_rate: config.stage.feed_rate,
            travel_axis: config.stage.travel_axis,
            autofocus: config.camera.autofocus,
            event_settle: config.acquisition.event_settle(),
            lead_in_increments: config.acquisition.lead_in_increments,
        }
    }
}

/// Progress of the run in flight, used to build an abort report
#[derive(Debug, Default)]
struct RunProgress {
    shots_fired: u32,
    offset: f64,
    busy_retries: u32,
}

/// Drives homing, origin setup and the move/shoot sequence
pub struct AcquisitionOrchestrator<P: StagePort, T: CameraTransport> {
    stage: StageLink<P>,
    camera: CameraLink<T>,
    options: SequenceOptions,
    state: SequenceState,
    homed: bool,
    origin_established: bool,
}

impl<P: StagePort, T: CameraTransport> AcquisitionOrchestrator<P, T> {
    /// Take ownership of both device links
    pub fn new(stage: StageLink<P>, camera: CameraLink<T>, options: SequenceOptions) -> Self {
        Self {
            stage,
            camera,
            options,
            state: SequenceState::Idle,
            homed: false,
            origin_established: false,
        }
    }

    /// Current state
    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Options in effect
    pub fn options(&self) -> &SequenceOptions {
        &self.options
    }

    /// Borrow the stage link between runs
    pub fn stage_mut(&mut self) -> &mut StageLink<P> {
        &mut self.stage
    }

    /// Borrow the camera link between runs
    pub fn camera_mut(&mut self) -> &mut CameraLink<T> {
        &mut self.camera
    }

    /// Release both device links
    pub fn into_parts(self) -> (StageLink<P>, CameraLink<T>) {
        (self.stage, self.camera)
    }

    fn transition(&mut self, target: SequenceState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(ControllerError::InvalidStateTransition {
                current: self.state.to_string(),
                requested: target.to_string(),
            }
            .into());
        }
        tracing::info!("Sequence state: {} -> {}", self.state, target);
        self.state = target;
        Ok(())
    }

    fn refuse(&self, requested: SequenceState) -> Error {
        ControllerError::InvalidStateTransition {
            current: self.state.to_string(),
            requested: requested.to_string(),
        }
        .into()
    }

    /// Home the stage and wait for it to stop
    pub fn home(&mut self) -> Result<()> {
        if !self.state.can_transition_to(SequenceState::Homed) {
            return Err(self.refuse(SequenceState::Homed));
        }
        self.stage.home(self.options.home_ignores_z)?;
        self.homed = true;
        self.origin_established = false;
        self.transition(SequenceState::Homed)
    }

    /// Move to the staging position and make its XY the logical origin
    ///
    /// Leaves the stage in relative positioning so every later move is an
    /// increment from the origin.
    pub fn establish_origin(&mut self) -> Result<()> {
        if !self.homed {
            return Err(self.refuse(SequenceState::OriginSet));
        }
        self.stage.set_absolute_positioning()?;
        self.stage.quick_move(self.options.staging)?;
        self.stage.set_relative_positioning()?;
        self.stage.set_origin()?;
        self.origin_established = true;
        self.transition(SequenceState::OriginSet)
    }

    /// Return to the logical origin of an earlier run
    pub fn reset_to_origin(&mut self) -> Result<()> {
        if !self.origin_established || self.state.is_active() {
            return Err(self.refuse(SequenceState::OriginSet));
        }
        self.stage.return_to_origin(self.options.feed_rate)?;
        self.transition(SequenceState::OriginSet)
    }

    /// Home, establish the origin and run one sequence
    pub fn run(&mut self, plan: &ShotPlan) -> std::result::Result<SequenceResult, SequenceAbort> {
        plan.validate()
            .map_err(|e| SequenceAbort::at(SequenceStep::Validate, e))?;
        self.home()
            .map_err(|e| self.abort_idle(SequenceStep::Home, e))?;
        self.establish_origin()
            .map_err(|e| self.abort_idle(SequenceStep::EstablishOrigin, e))?;
        self.run_sequence(plan)
    }

    fn abort_idle(&mut self, step: SequenceStep, source: Error) -> SequenceAbort {
        tracing::error!("Sequence aborted during {}: {}", step, source);
        self.state = SequenceState::Idle;
        SequenceAbort::at(step, source)
    }

    /// Run the move/shoot sequence from the established origin
    ///
    /// Requires [`SequenceState::OriginSet`]. The plan is validated before
    /// anything is sent to either device.
    pub fn run_sequence(
        &mut self,
        plan: &ShotPlan,
    ) -> std::result::Result<SequenceResult, SequenceAbort> {
        plan.validate()
            .map_err(|e| SequenceAbort::at(SequenceStep::Validate, e))?;
        if self.state != SequenceState::OriginSet {
            return Err(SequenceAbort::at(
                SequenceStep::Validate,
                self.refuse(SequenceState::Sequencing),
            ));
        }
        self.transition(SequenceState::Sequencing)
            .map_err(|e| SequenceAbort::at(SequenceStep::Validate, e))?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let requested_shots = plan.shot_count();
        let step = plan.step();
        let axis = self.options.travel_axis;
        let mut progress = RunProgress::default();

        tracing::info!("Starting run {}: {}", run_id, plan);
        tracing::info!(
            "{} shots of {:+.2} mm along {}, feed rate {}",
            requested_shots,
            step,
            axis,
            self.options.feed_rate
        );

        if self.options.lead_in_increments > 0 {
            let back_off = plan.direction.reversed().sign()
                * plan.stacking_increment()
                * f64::from(self.options.lead_in_increments);
            tracing::info!("Lead-in move of {:+.2} mm", back_off);
            self.stage
                .controlled_move(PartialPosition::along(axis, back_off), self.options.feed_rate)
                .map_err(|e| self.abort(SequenceStep::LeadIn, &progress, e))?;
            progress.offset += back_off;
        }

        match self.camera.drain_events() {
            Some(stale) if !stale.is_empty() => {
                tracing::info!("Discarded {} stale camera event(s)", stale.len());
            }
            Some(_) => {}
            None => {
                let err = no_response("event polling");
                return Err(self.abort(SequenceStep::DrainStaleEvents, &progress, err));
            }
        }

        for shot in 1..=requested_shots {
            self.stage
                .controlled_move(PartialPosition::along(axis, step), self.options.feed_rate)
                .map_err(|e| self.abort(SequenceStep::Move(shot), &progress, e))?;
            progress.offset += step;

            let report = self
                .camera
                .trigger_shutter(self.options.autofocus)
                .map_err(|e| self.abort(SequenceStep::Shutter(shot), &progress, e))?;
            progress.shots_fired += 1;
            progress.busy_retries += report.busy_retries();

            tracing::info!(
                "Shot {}/{} at {:+.2} mm",
                shot,
                requested_shots,
                progress.offset
            );
        }

        self.transition(SequenceState::Reporting)
            .map_err(|e| self.abort(SequenceStep::Reconcile, &progress, e))?;

        if !self.options.event_settle.is_zero() {
            thread::sleep(self.options.event_settle);
        }

        let captured_files = match self.camera.drain_events() {
            Some(batch) => batch.added,
            None => {
                let err = no_response("event polling");
                return Err(self.abort(SequenceStep::Reconcile, &progress, err));
            }
        };

        let final_position = match self.stage.query_position() {
            Ok(pos) => {
                tracing::info!("Stage at {:+.2} mm along {}", pos.axis(axis), axis);
                Some(pos)
            }
            Err(e) => {
                tracing::error!("Could not read final stage position: {}", e);
                None
            }
        };

        let result = SequenceResult {
            run_id,
            started_at,
            requested_shots,
            captured_files,
            elapsed: started.elapsed(),
            shots_fired: progress.shots_fired,
            busy_retries: progress.busy_retries,
            final_position,
        };

        if result.is_reconciled() {
            tracing::info!("{}", result);
        } else {
            tracing::warn!(
                "Camera reported {} file(s) for {} requested shot(s) (discrepancy {})",
                result.captured_files.len(),
                requested_shots,
                result.discrepancy()
            );
        }

        self.state = SequenceState::Idle;
        tracing::info!("Sequence state: {} -> {}", SequenceState::Reporting, self.state);
        Ok(result)
    }

    fn abort(
        &mut self,
        step: SequenceStep,
        progress: &RunProgress,
        source: Error,
    ) -> SequenceAbort {
        tracing::error!(
            "Sequence aborted during {} after {} shot(s): {}",
            step,
            progress.shots_fired,
            source
        );

        let position = if source.is_link_failure() {
            None
        } else {
            self.stage.query_position().ok()
        };

        self.state = SequenceState::Idle;
        SequenceAbort {
            step,
            shots_fired: progress.shots_fired,
            logical_offset_mm: progress.offset,
            position,
            source,
        }
    }

    /// Current stage position
    pub fn position(&mut self) -> Result<StagePosition> {
        self.stage.query_position()
    }
}

fn no_response(action: &str) -> Error {
    CameraError::NoResponse {
        action: action.to_string(),
    }
    .into()
}
