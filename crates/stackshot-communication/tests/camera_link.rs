use stackshot_communication::{
    BusyRetryPolicy, CameraLink, DeviceAction, DeviceJournal, SimulatedCamera,
};
use stackshot_core::{CameraError, Error};
use std::time::Duration;

fn link(camera: SimulatedCamera) -> CameraLink<SimulatedCamera> {
    CameraLink::new(camera).with_retry_policy(BusyRetryPolicy::unbounded(Duration::ZERO))
}

fn presses(journal: &DeviceJournal) -> usize {
    journal.count(|a| matches!(a, DeviceAction::ShutterPress { .. }))
}

fn releases(journal: &DeviceJournal) -> usize {
    journal.count(|a| matches!(a, DeviceAction::ShutterRelease { .. }))
}

#[test]
fn test_busy_twice_then_accepted() {
    let journal = DeviceJournal::new();
    let mut camera = link(SimulatedCamera::new(journal.clone()).script_presses(&[503, 503, 200]));

    let report = camera.trigger_shutter(false).unwrap();

    assert_eq!(report.press_attempts, 3);
    assert_eq!(report.busy_retries(), 2);
    assert_eq!(presses(&journal), 3);
    assert_eq!(releases(&journal), 1);
}

#[test]
fn test_single_accepted_press() {
    let journal = DeviceJournal::new();
    let mut camera = link(SimulatedCamera::new(journal.clone()));

    let report = camera.trigger_shutter(true).unwrap();

    assert_eq!(report.press_attempts, 1);
    assert_eq!(
        journal.entries(),
        vec![
            DeviceAction::ShutterPress { status: 200 },
            DeviceAction::ShutterRelease { status: 200 },
        ]
    );
}

#[test]
fn test_bounded_busy_policy_gives_up() {
    let journal = DeviceJournal::new();
    let mut camera = CameraLink::new(SimulatedCamera::new(journal.clone()).busy_for(10))
        .with_retry_policy(BusyRetryPolicy::bounded(Duration::ZERO, 4));

    let err = camera.trigger_shutter(false).unwrap_err();

    assert!(matches!(
        err,
        Error::Camera(CameraError::BusyRetriesExhausted { attempts: 4 })
    ));
    assert_eq!(presses(&journal), 4);
    assert_eq!(releases(&journal), 0);
}

#[test]
fn test_non_busy_press_failure_is_not_retried() {
    let journal = DeviceJournal::new();
    let mut camera = link(SimulatedCamera::new(journal.clone()).script_presses(&[400]));

    let err = camera.trigger_shutter(false).unwrap_err();

    assert!(matches!(
        err,
        Error::Camera(CameraError::Rejected { status: 400, .. })
    ));
    assert_eq!(presses(&journal), 1);
    assert_eq!(releases(&journal), 0);
}

#[test]
fn test_release_failure_reports_failure() {
    let journal = DeviceJournal::new();
    let mut camera = link(SimulatedCamera::new(journal.clone()).script_releases(&[500]));

    let err = camera.trigger_shutter(false).unwrap_err();

    match err {
        Error::Camera(CameraError::Rejected {
            action, status, message,
        }) => {
            assert_eq!(action, "release");
            assert_eq!(status, 500);
            assert_eq!(message.as_deref(), Some("Operation failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unreachable_camera_yields_empty_results() {
    let mut camera = link(SimulatedCamera::new(DeviceJournal::new()).unreachable());

    assert!(camera.get_resource("/ccapi").is_none());
    assert!(camera.drain_events().is_none());
    let err = camera.trigger_shutter(false).unwrap_err();
    assert!(matches!(err, Error::Camera(CameraError::NoResponse { .. })));
    assert!(camera.open().is_err());
}

#[test]
fn test_drain_events_is_destructive() {
    let journal = DeviceJournal::new();
    let mut camera = link(SimulatedCamera::new(journal).with_stale_event("/stale.JPG"));

    assert_eq!(camera.drain_events().unwrap().added, vec!["/stale.JPG".to_string()]);
    assert!(camera.drain_events().unwrap().is_empty());

    camera.trigger_shutter(false).unwrap();
    camera.trigger_shutter(false).unwrap();
    let batch = camera.drain_events().unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.added[0].ends_with("IMG_0001.JPG"));
    assert!(batch.added[1].ends_with("IMG_0002.JPG"));
}

#[test]
fn test_malformed_polling_payload_yields_no_batch() {
    let journal = DeviceJournal::new();
    let mut camera = link(
        SimulatedCamera::new(journal)
            .with_stale_event("/stale.JPG")
            .garble_drain(1),
    );

    assert_eq!(camera.drain_events(), None);
    // The undecodable answer did not lose the buffered event
    assert_eq!(camera.drain_events().unwrap().added, vec!["/stale.JPG".to_string()]);
}

#[test]
fn test_status_queries() {
    let mut camera = link(SimulatedCamera::new(DeviceJournal::new()));
    camera.open().unwrap();

    let battery = camera.battery_status().unwrap();
    assert_eq!(battery.level.as_deref(), Some("full"));

    let dir = camera.current_directory().unwrap();
    assert!(dir.is_mounted());
    assert_eq!(dir.name.as_deref(), Some("100CANON"));

    camera.trigger_shutter(false).unwrap();
    let count = camera
        .directory_entry_count(dir.path.as_deref().unwrap())
        .unwrap();
    assert_eq!(count.contentsnumber, Some(1));
    assert_eq!(count.pagenumber, Some(1));
}

#[test]
fn test_fetch_and_delete_content() {
    let mut camera = link(SimulatedCamera::new(DeviceJournal::new()));
    camera.trigger_shutter(false).unwrap();
    let path = camera.drain_events().unwrap().added.remove(0);

    let bytes = camera.fetch_content(&path).unwrap();
    assert!(!bytes.is_empty());

    camera.delete_content(&path).unwrap();
    assert!(camera.transport().stored_files().is_empty());

    let err = camera.fetch_content(&path).unwrap_err();
    assert!(matches!(err, Error::Camera(CameraError::Rejected { status: 404, .. })));
}
