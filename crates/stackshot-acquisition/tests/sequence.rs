use stackshot_acquisition::{
    AcquisitionOrchestrator, SequenceOptions, SequenceState, SequenceStep,
};
use stackshot_communication::{
    BusyRetryPolicy, CameraLink, DeviceAction, DeviceJournal, SimulatedCamera, SimulatedStagePort,
    StageLink,
};
use stackshot_core::{
    CameraError, Direction, Error, LinkError, PlanError, ShotPlan, StagePosition,
};
use std::time::Duration;

type SimOrchestrator = AcquisitionOrchestrator<SimulatedStagePort, SimulatedCamera>;

fn options() -> SequenceOptions {
    SequenceOptions {
        event_settle: Duration::ZERO,
        ..SequenceOptions::default()
    }
}

fn build(
    stage: SimulatedStagePort,
    camera: SimulatedCamera,
    options: SequenceOptions,
) -> SimOrchestrator {
    let camera =
        CameraLink::new(camera).with_retry_policy(BusyRetryPolicy::unbounded(Duration::ZERO));
    AcquisitionOrchestrator::new(StageLink::new(stage), camera, options)
}

fn simulated(journal: &DeviceJournal) -> SimOrchestrator {
    build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()),
        options(),
    )
}

fn reference_plan() -> ShotPlan {
    ShotPlan::new(100.0, 5.6, 400.0, 100.0, Direction::Positive)
}

/// floor(12.7 / 1.58) + 2 = 10 shots
fn ten_shot_plan(direction: Direction) -> ShotPlan {
    ShotPlan::new(100.0, 5.6, 400.0, 12.7, direction)
}

fn is_shot_move(action: &DeviceAction) -> bool {
    matches!(action, DeviceAction::Stage(cmd) if cmd.starts_with("G1 "))
}

#[test]
fn test_reference_plan_alternates_moves_and_shots() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    let result = orchestrator.run(&reference_plan()).unwrap();
    assert_eq!(result.requested_shots, 65);
    assert_eq!(result.shots_fired, 65);
    assert_eq!(result.captured_files.len(), 65);
    assert!(result.is_reconciled());
    assert_eq!(orchestrator.state(), SequenceState::Idle);

    let entries = journal.entries();
    let first_drain = entries
        .iter()
        .position(|a| matches!(a, DeviceAction::EventDrain { .. }))
        .unwrap();

    // Each shot is: move, buffer drain, press, release
    let mut pairs = 0;
    let mut i = first_drain + 1;
    while i < entries.len() && is_shot_move(&entries[i]) {
        assert_eq!(entries[i], DeviceAction::Stage("G1 Y1.58 F120".to_string()));
        assert_eq!(entries[i + 1], DeviceAction::Stage("M400".to_string()));
        assert_eq!(entries[i + 2], DeviceAction::ShutterPress { status: 200 });
        assert_eq!(entries[i + 3], DeviceAction::ShutterRelease { status: 200 });
        pairs += 1;
        i += 4;
    }
    assert_eq!(pairs, 65);
    assert_eq!(entries[i], DeviceAction::EventDrain { added: 65 });
    assert_eq!(entries[i + 1], DeviceAction::Stage("M114".to_string()));
    assert_eq!(entries.len(), i + 2);
}

#[test]
fn test_setup_establishes_reference_frame() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    orchestrator.home().unwrap();
    assert_eq!(orchestrator.state(), SequenceState::Homed);
    orchestrator.establish_origin().unwrap();
    assert_eq!(orchestrator.state(), SequenceState::OriginSet);

    assert_eq!(
        journal.stage_commands(),
        vec!["G28 X Y", "M400", "G90", "G0 X0 Y120 Z190", "M400", "G91", "G92 X0 Y0"]
    );
    assert_eq!(orchestrator.position().unwrap(), StagePosition::new(0.0, 0.0, 190.0));
}

#[test]
fn test_final_position_is_left_at_offset() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    let result = orchestrator.run(&reference_plan()).unwrap();
    let pos = result.final_position.unwrap();
    assert_eq!(pos.x, 0.0);
    assert!((pos.y - 102.7).abs() < 1e-9);
    assert_eq!(pos.z, 190.0);
}

#[test]
fn test_negative_direction() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    let result = orchestrator.run(&ten_shot_plan(Direction::Negative)).unwrap();
    assert_eq!(result.requested_shots, 10);
    assert!(journal
        .stage_commands()
        .iter()
        .filter(|c| c.starts_with("G1 "))
        .all(|c| c == "G1 Y-1.58 F120"));
    assert!((result.final_position.unwrap().y + 15.8).abs() < 1e-9);
}

#[test]
fn test_missing_event_is_a_discrepancy_not_an_error() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()).drop_events(1),
        options(),
    );

    let result = orchestrator.run(&ten_shot_plan(Direction::Positive)).unwrap();
    assert_eq!(result.requested_shots, 10);
    assert_eq!(result.shots_fired, 10);
    assert_eq!(result.captured_files.len(), 9);
    assert_eq!(result.discrepancy(), 1);
    assert!(!result.is_reconciled());
}

#[test]
fn test_stale_events_are_discarded_before_shooting() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone())
            .with_stale_event("/ccapi/ver110/contents/sd/100CANON/IMG_0999.JPG"),
        options(),
    );

    let result = orchestrator.run(&ten_shot_plan(Direction::Positive)).unwrap();
    assert!(result.is_reconciled());
    assert!(!result
        .captured_files
        .iter()
        .any(|f| f.ends_with("IMG_0999.JPG")));
    assert_eq!(journal.count(|a| *a == DeviceAction::EventDrain { added: 1 }), 1);
}

#[test]
fn test_busy_retries_are_counted() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()).busy_for(2),
        options(),
    );

    let result = orchestrator.run(&ten_shot_plan(Direction::Positive)).unwrap();
    assert_eq!(result.busy_retries, 2);
    assert_eq!(result.shots_fired, 10);
    assert_eq!(journal.count(|a| matches!(a, DeviceAction::ShutterPress { .. })), 12);
    assert_eq!(journal.count(DeviceAction::is_capture), 10);
}

#[test]
fn test_lead_in_moves_opposite_to_travel() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()),
        SequenceOptions {
            lead_in_increments: 2,
            ..options()
        },
    );

    orchestrator.run(&ten_shot_plan(Direction::Positive)).unwrap();
    let moves: Vec<String> = journal
        .stage_commands()
        .into_iter()
        .filter(|c| c.starts_with("G1 "))
        .collect();
    assert_eq!(moves.len(), 11);
    assert_eq!(moves[0], "G1 Y-3.16 F120");
    assert!(moves[1..].iter().all(|c| c == "G1 Y1.58 F120"));
}

#[test]
fn test_stage_failure_reports_partial_state() {
    let journal = DeviceJournal::new();
    // Homing takes 2 writes, origin setup 5, each shot 2
    let stage = SimulatedStagePort::new(journal.clone()).fail_after_writes(7 + 2 * 3);
    let mut orchestrator = build(stage, SimulatedCamera::new(journal.clone()), options());

    let abort = orchestrator
        .run(&ten_shot_plan(Direction::Positive))
        .unwrap_err();
    assert_eq!(abort.step, SequenceStep::Move(4));
    assert_eq!(abort.shots_fired, 3);
    assert!((abort.logical_offset_mm - 4.74).abs() < 1e-9);
    assert!(abort.source.is_link_failure());
    assert_eq!(abort.position, None);
    assert_eq!(orchestrator.state(), SequenceState::Idle);
    assert_eq!(journal.count(DeviceAction::is_capture), 3);
}

#[test]
fn test_camera_rejection_aborts_without_release() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()).script_presses(&[200, 200, 400]),
        options(),
    );

    let abort = orchestrator
        .run(&ten_shot_plan(Direction::Positive))
        .unwrap_err();
    assert_eq!(abort.step, SequenceStep::Shutter(3));
    assert_eq!(abort.shots_fired, 2);
    assert!(matches!(
        abort.source,
        Error::Camera(CameraError::Rejected { status: 400, .. })
    ));
    assert_eq!(journal.count(|a| matches!(a, DeviceAction::ShutterRelease { .. })), 2);

    // The stage link is healthy, so the position is reported
    let pos = abort.position.unwrap();
    assert!((pos.y - 4.74).abs() < 1e-9);
}

#[test]
fn test_bounded_busy_policy_aborts() {
    let journal = DeviceJournal::new();
    let camera = CameraLink::new(SimulatedCamera::new(journal.clone()).busy_for(5))
        .with_retry_policy(BusyRetryPolicy::bounded(Duration::ZERO, 3));
    let mut orchestrator = AcquisitionOrchestrator::new(
        StageLink::new(SimulatedStagePort::new(journal.clone())),
        camera,
        options(),
    );

    let abort = orchestrator
        .run(&ten_shot_plan(Direction::Positive))
        .unwrap_err();
    assert_eq!(abort.step, SequenceStep::Shutter(1));
    assert!(abort.source.is_busy());
    assert_eq!(journal.count(|a| matches!(a, DeviceAction::ShutterPress { .. })), 3);
}

#[test]
fn test_unreachable_camera_aborts_before_shooting() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()).unreachable(),
        options(),
    );

    let abort = orchestrator.run(&reference_plan()).unwrap_err();
    assert_eq!(abort.step, SequenceStep::DrainStaleEvents);
    assert_eq!(abort.shots_fired, 0);
    assert!(abort.source.is_camera_error());
    assert_eq!(journal.count(is_shot_move), 0);
}

#[test]
fn test_malformed_final_batch_aborts_after_all_shots() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()).garble_drain(2),
        options(),
    );

    let abort = orchestrator
        .run(&ten_shot_plan(Direction::Positive))
        .unwrap_err();
    assert_eq!(abort.step, SequenceStep::Reconcile);
    assert_eq!(abort.shots_fired, 10);
    assert!(abort.source.is_camera_error());
    assert!((abort.logical_offset_mm - 15.8).abs() < 1e-9);
    assert!((abort.position.unwrap().y - 15.8).abs() < 1e-9);
    assert_eq!(orchestrator.state(), SequenceState::Idle);
    assert_eq!(journal.count(DeviceAction::is_capture), 10);
}

#[test]
fn test_malformed_stale_batch_aborts_before_shooting() {
    let journal = DeviceJournal::new();
    let mut orchestrator = build(
        SimulatedStagePort::new(journal.clone()),
        SimulatedCamera::new(journal.clone()).garble_drain(1),
        options(),
    );

    let abort = orchestrator.run(&reference_plan()).unwrap_err();
    assert_eq!(abort.step, SequenceStep::DrainStaleEvents);
    assert_eq!(abort.shots_fired, 0);
    assert_eq!(journal.count(is_shot_move), 0);
}

#[test]
fn test_closed_stage_stream_skips_position_query() {
    let journal = DeviceJournal::new();
    // Homing takes 2 writes, origin setup 5, each shot 2
    let stage = SimulatedStagePort::new(journal.clone()).hang_up_after_writes(7 + 2 * 2);
    let mut orchestrator = build(stage, SimulatedCamera::new(journal.clone()), options());

    let abort = orchestrator
        .run(&ten_shot_plan(Direction::Positive))
        .unwrap_err();
    assert_eq!(abort.step, SequenceStep::Move(3));
    assert_eq!(abort.shots_fired, 2);
    assert!(matches!(abort.source, Error::Link(LinkError::Closed { .. })));
    assert_eq!(abort.position, None);
    // No M114 was attempted on the dead link
    assert!(!journal.stage_commands().iter().any(|c| c == "M114"));
}

#[test]
fn test_oversized_plan_is_rejected_before_any_motion() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    let plan = ShotPlan::new(100.0, 5.6, 400.0, 1.0e10, Direction::Positive);
    let abort = orchestrator.run(&plan).unwrap_err();
    assert_eq!(abort.step, SequenceStep::Validate);
    assert!(matches!(abort.source, Error::Plan(PlanError::TooManyShots { .. })));
    assert!(journal.entries().is_empty());
}

#[test]
fn test_invalid_plan_touches_no_device() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    let plan = ShotPlan::new(100.0, 5.6, 400.0, 0.0, Direction::Positive);
    let abort = orchestrator.run(&plan).unwrap_err();
    assert_eq!(abort.step, SequenceStep::Validate);
    assert!(matches!(abort.source, Error::Plan(_)));
    assert!(journal.entries().is_empty());
}

#[test]
fn test_sequence_requires_origin() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    let abort = orchestrator.run_sequence(&reference_plan()).unwrap_err();
    assert_eq!(abort.step, SequenceStep::Validate);
    assert!(matches!(abort.source, Error::Controller(_)));
    assert!(journal.entries().is_empty());

    assert!(orchestrator.establish_origin().is_err());
    assert!(orchestrator.reset_to_origin().is_err());
}

#[test]
fn test_second_run_after_returning_to_origin() {
    let journal = DeviceJournal::new();
    let mut orchestrator = simulated(&journal);

    let first = orchestrator.run(&ten_shot_plan(Direction::Positive)).unwrap();
    journal.clear();

    orchestrator.reset_to_origin().unwrap();
    assert_eq!(orchestrator.state(), SequenceState::OriginSet);
    assert_eq!(
        journal.stage_commands()[..4].to_vec(),
        vec!["G90", "G1 X0 Y0 F120", "M400", "G91"]
    );

    let second = orchestrator
        .run_sequence(&ten_shot_plan(Direction::Positive))
        .unwrap();
    assert!(second.is_reconciled());
    assert_ne!(first.run_id, second.run_id);
    assert!(first
        .captured_files
        .iter()
        .all(|f| !second.captured_files.contains(f)));
}
