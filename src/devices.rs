//! Device construction from configuration
//!
//! Builds the real serial/HTTP links or their simulated stand-ins from the
//! loaded [`Config`](stackshot_settings::Config).

use stackshot_communication::{
    list_ports, BusyRetryPolicy, CameraLink, CameraTransport, DeviceJournal,
    HttpCameraTransport, RealSerialPort, SimulatedCamera, SimulatedStagePort, StageLink,
};
use stackshot_core::Result;
use stackshot_settings::{CameraSettings, StageSettings};
use std::thread;
use std::time::Duration;

/// Open the stage serial port and wait for the board to come up
///
/// Opening the port resets most printer boards, so commands sent before the
/// startup delay has elapsed are lost.
pub fn open_stage(settings: &StageSettings) -> Result<StageLink<RealSerialPort>> {
    let port = match RealSerialPort::open(&settings.port, settings.baud_rate) {
        Ok(port) => port,
        Err(e) => {
            if let Ok(ports) = list_ports() {
                let names: Vec<&str> = ports.iter().map(|p| p.port_name.as_str()).collect();
                tracing::warn!("Available serial ports: {}", names.join(", "));
            }
            return Err(e.into());
        }
    };
    tracing::info!(
        "Opened stage on {} at {} baud, waiting {} ms for reset",
        settings.port,
        settings.baud_rate,
        settings.startup_delay_ms
    );
    thread::sleep(settings.startup_delay());
    Ok(StageLink::new(port).with_write_settle(settings.write_settle()))
}

/// Open the camera HTTP link and confirm the camera answers
pub fn open_camera(settings: &CameraSettings) -> Result<CameraLink<HttpCameraTransport>> {
    let transport = HttpCameraTransport::new(
        &settings.base_url,
        settings.connect_timeout(),
        settings.read_timeout(),
    )?;
    let mut camera = camera_link(transport, settings);
    camera.open()?;
    tracing::info!("Connected to camera at {}", settings.base_url);
    Ok(camera)
}

/// Wrap a transport with the configured busy policy and release settle
pub fn camera_link<T: CameraTransport>(transport: T, settings: &CameraSettings) -> CameraLink<T> {
    CameraLink::new(transport)
        .with_retry_policy(BusyRetryPolicy {
            delay: settings.busy_retry_delay(),
            max_attempts: settings.max_busy_attempts,
        })
        .with_release_settle(settings.release_settle())
}

/// Simulated stage recording into `journal`
pub fn simulated_stage(journal: &DeviceJournal) -> StageLink<SimulatedStagePort> {
    StageLink::new(SimulatedStagePort::new(journal.clone()))
}

/// Simulated camera recording into `journal`, without settle delays
pub fn simulated_camera(
    journal: &DeviceJournal,
    settings: &CameraSettings,
) -> CameraLink<SimulatedCamera> {
    camera_link(SimulatedCamera::new(journal.clone()), settings)
        .with_release_settle(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_link_uses_configured_policy() {
        let settings = CameraSettings {
            busy_retry_delay_ms: 50,
            max_busy_attempts: Some(8),
            ..CameraSettings::default()
        };
        let camera = simulated_camera(&DeviceJournal::new(), &settings);
        assert_eq!(
            camera.retry_policy(),
            BusyRetryPolicy::bounded(Duration::from_millis(50), 8)
        );
    }

    #[test]
    fn test_simulated_stage_answers() {
        let journal = DeviceJournal::new();
        let mut stage = simulated_stage(&journal);
        stage.home(true).unwrap();
        assert_eq!(journal.stage_commands(), vec!["G28 X Y", "M400"]);
    }
}
