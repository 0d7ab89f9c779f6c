//! Simulated devices
//!
//! In-process stand-ins for the stage firmware and the camera, sharing a
//! [`DeviceJournal`] so the exact interleaving of stage commands and camera
//! actions can be inspected. Used for dry runs and tests.

use crate::communication::http::{CameraRequest, CameraResponse, CameraTransport, HttpMethod};
use crate::communication::serial::StagePort;
use crate::firmware::ccapi::{resources, BUSY_STATUS, OK_STATUS};
use parking_lot::Mutex;
use serde_json::{json, Value};
use stackshot_core::{CameraError, StagePosition};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;

/// One observable device interaction
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceAction {
    /// A stage command line, without its terminator
    Stage(String),
    /// A shutter press attempt and the status it received
    ShutterPress {
        /// Status returned to the press
        status: u16,
    },
    /// A shutter release and the status it received
    ShutterRelease {
        /// Status returned to the release
        status: u16,
    },
    /// An event buffer drain and how many added files it returned
    EventDrain {
        /// Number of files reported
        added: usize,
    },
}

impl DeviceAction {
    /// Whether this is a stage move command (`G0`/`G1`)
    pub fn is_stage_move(&self) -> bool {
        matches!(self, DeviceAction::Stage(cmd) if cmd.starts_with("G0 ") || cmd.starts_with("G1 "))
    }

    /// Whether this is an accepted shutter release
    pub fn is_capture(&self) -> bool {
        matches!(self, DeviceAction::ShutterRelease { status } if *status == OK_STATUS)
    }
}

/// Shared, ordered log of device interactions
#[derive(Debug, Clone, Default)]
pub struct DeviceJournal {
    entries: Arc<Mutex<Vec<DeviceAction>>>,
}

impl DeviceJournal {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action
    pub fn record(&self, action: DeviceAction) {
        self.entries.lock().push(action);
    }

    /// Snapshot of all actions so far
    pub fn entries(&self) -> Vec<DeviceAction> {
        self.entries.lock().clone()
    }

    /// Stage commands only
    pub fn stage_commands(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|a| match a {
                DeviceAction::Stage(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// Count actions matching a predicate
    pub fn count(&self, predicate: impl Fn(&DeviceAction) -> bool) -> usize {
        self.entries.lock().iter().filter(|a| predicate(a)).count()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Simulated Marlin stage
///
/// Tracks positioning mode and logical position, answers `M114` with a
/// Marlin-formatted report and acknowledges every line with `ok`.
pub struct SimulatedStagePort {
    journal: DeviceJournal,
    position: StagePosition,
    absolute: bool,
    pending: VecDeque<String>,
    fail_after_writes: Option<usize>,
    hang_up_after_writes: Option<usize>,
    writes: usize,
}

impl SimulatedStagePort {
    /// Create a stage at the machine origin in absolute mode
    pub fn new(journal: DeviceJournal) -> Self {
        Self {
            journal,
            position: StagePosition::default(),
            absolute: true,
            pending: VecDeque::new(),
            fail_after_writes: None,
            hang_up_after_writes: None,
            writes: 0,
        }
    }

    /// Make every write after the first `writes` fail
    pub fn fail_after_writes(mut self, writes: usize) -> Self {
        self.fail_after_writes = Some(writes);
        self
    }

    /// Close the stream after the first `writes`: later lines are accepted
    /// but never acknowledged
    pub fn hang_up_after_writes(mut self, writes: usize) -> Self {
        self.hang_up_after_writes = Some(writes);
        self
    }

    /// Current logical position
    pub fn position(&self) -> StagePosition {
        self.position
    }

    fn apply(&mut self, command: &str) {
        let mut words = command.split_whitespace();
        let Some(code) = words.next() else {
            return;
        };
        let params: Vec<(char, f64)> = words
            .filter_map(|w| {
                let mut chars = w.chars();
                let letter = chars.next()?.to_ascii_uppercase();
                let value = chars.as_str().parse::<f64>().unwrap_or(0.0);
                Some((letter, value))
            })
            .collect();

        match code {
            "G90" => self.absolute = true,
            "G91" => self.absolute = false,
            "G0" | "G1" => {
                for (letter, value) in params {
                    let axis = match letter {
                        'X' => &mut self.position.x,
                        'Y' => &mut self.position.y,
                        'Z' => &mut self.position.z,
                        _ => continue,
                    };
                    if self.absolute {
                        *axis = value;
                    } else {
                        *axis += value;
                    }
                }
            }
            "G92" => {
                for (letter, value) in params {
                    match letter {
                        'X' => self.position.x = value,
                        'Y' => self.position.y = value,
                        'Z' => self.position.z = value,
                        _ => {}
                    }
                }
            }
            "G28" => {
                if params.is_empty() {
                    self.position = StagePosition::default();
                }
                for (letter, _) in params {
                    match letter {
                        'X' => self.position.x = 0.0,
                        'Y' => self.position.y = 0.0,
                        'Z' => self.position.z = 0.0,
                        _ => {}
                    }
                }
            }
            "M114" => {
                self.pending.push_back(format!(
                    "X:{:.2} Y:{:.2} Z:{:.2} E:0.00 Count X:0 Y:0 Z:0\n",
                    self.position.x, self.position.y, self.position.z
                ));
            }
            _ => {}
        }
    }
}

impl StagePort for SimulatedStagePort {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.fail_after_writes.is_some_and(|limit| self.writes >= limit) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated link failure"));
        }
        let hung_up = self
            .hang_up_after_writes
            .is_some_and(|limit| self.writes >= limit);
        self.writes += 1;

        let command = line.trim_end_matches(['\r', '\n']).to_string();
        self.journal.record(DeviceAction::Stage(command.clone()));
        if hung_up {
            self.pending.clear();
            return Ok(());
        }
        self.apply(&command);
        self.pending.push_back("ok\n".to_string());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.pending.pop_front())
    }

    fn name(&self) -> String {
        "simulated-stage".to_string()
    }
}

/// Simulated camera speaking the CCAPI subset used here
///
/// Each accepted press/release pair stores a new file and queues it in the
/// polling buffer; draining the buffer clears it.
pub struct SimulatedCamera {
    journal: DeviceJournal,
    folder: String,
    next_image: u32,
    press_statuses: VecDeque<u16>,
    release_statuses: VecDeque<u16>,
    unreported_captures: usize,
    unreachable: bool,
    garbled_drain: Option<usize>,
    drains: usize,
    polled: Vec<String>,
    stored: HashMap<String, Vec<u8>>,
}

impl SimulatedCamera {
    /// Create a reachable, idle camera
    pub fn new(journal: DeviceJournal) -> Self {
        Self {
            journal,
            folder: "/ccapi/ver110/contents/sd/100CANON".to_string(),
            next_image: 1,
            press_statuses: VecDeque::new(),
            release_statuses: VecDeque::new(),
            unreported_captures: 0,
            unreachable: false,
            garbled_drain: None,
            drains: 0,
            polled: Vec::new(),
            stored: HashMap::new(),
        }
    }

    /// Answer the next press attempts with these statuses (200 afterwards)
    pub fn script_presses(mut self, statuses: &[u16]) -> Self {
        self.press_statuses.extend(statuses);
        self
    }

    /// Answer the next releases with these statuses (200 afterwards)
    pub fn script_releases(mut self, statuses: &[u16]) -> Self {
        self.release_statuses.extend(statuses);
        self
    }

    /// Stage `count` busy answers before the next accepted press
    pub fn busy_for(self, count: usize) -> Self {
        let statuses = vec![BUSY_STATUS; count];
        self.script_presses(&statuses)
    }

    /// Store the next `count` captures without reporting them in the polling buffer
    pub fn drop_events(mut self, count: usize) -> Self {
        self.unreported_captures = count;
        self
    }

    /// Fail every request as if the camera left the network
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Answer the `nth` event drain (1-based) with a body that is not a
    /// polling payload; the buffer is left untouched
    pub fn garble_drain(mut self, nth: usize) -> Self {
        self.garbled_drain = Some(nth);
        self
    }

    /// Put a stale file into the polling buffer
    pub fn with_stale_event(mut self, path: impl Into<String>) -> Self {
        self.polled.push(path.into());
        self
    }

    /// Paths of files currently stored on the card
    pub fn stored_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.stored.keys().cloned().collect();
        files.sort();
        files
    }

    fn shutter(&mut self, body: Option<&Value>) -> CameraResponse {
        let action = body
            .and_then(|b| b.get("action"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        match action {
            "full_press" => {
                let status = self.press_statuses.pop_front().unwrap_or(OK_STATUS);
                self.journal.record(DeviceAction::ShutterPress { status });
                status_response(status)
            }
            "release" => {
                let status = self.release_statuses.pop_front().unwrap_or(OK_STATUS);
                self.journal.record(DeviceAction::ShutterRelease { status });
                if status == OK_STATUS {
                    let path = format!("{}/IMG_{:04}.JPG", self.folder, self.next_image);
                    self.next_image += 1;
                    self.stored
                        .insert(path.clone(), format!("jpeg:{}", path).into_bytes());
                    if self.unreported_captures > 0 {
                        self.unreported_captures -= 1;
                    } else {
                        self.polled.push(path);
                    }
                }
                status_response(status)
            }
            _ => json_response(400, json!({"message": "Invalid parameter"})),
        }
    }

    fn route(&mut self, request: &CameraRequest) -> CameraResponse {
        let resource = request.resource.as_str();
        match (request.method, resource) {
            (HttpMethod::Post, resources::SHUTTER_BUTTON_MANUAL) => {
                self.shutter(request.body.as_ref())
            }
            (HttpMethod::Get, resources::ROOT) => json_response(OK_STATUS, json!({})),
            (HttpMethod::Get, resources::EVENT_POLLING) => {
                self.drains += 1;
                if self.garbled_drain == Some(self.drains) {
                    self.journal.record(DeviceAction::EventDrain { added: 0 });
                    let body = b"<html>Service Unavailable</html>".to_vec();
                    return CameraResponse::new(OK_STATUS, body);
                }
                let added = std::mem::take(&mut self.polled);
                self.journal
                    .record(DeviceAction::EventDrain { added: added.len() });
                if added.is_empty() {
                    json_response(OK_STATUS, json!({}))
                } else {
                    json_response(OK_STATUS, json!({ "addedcontents": added }))
                }
            }
            (HttpMethod::Get, resources::BATTERY) => json_response(
                OK_STATUS,
                json!({"name": "LP-E6NH", "kind": "battery", "level": "full", "quality": "good"}),
            ),
            (HttpMethod::Get, resources::CURRENT_DIRECTORY) => json_response(
                OK_STATUS,
                json!({"name": "100CANON", "path": self.folder}),
            ),
            (HttpMethod::Get, path) if path.ends_with(resources::ENTRY_COUNT_QUERY) => {
                let count = self.stored.len();
                json_response(
                    OK_STATUS,
                    json!({"contentsnumber": count, "pagenumber": count.div_ceil(100)}),
                )
            }
            (HttpMethod::Get, path) => match self.stored.get(path) {
                Some(bytes) => CameraResponse::new(OK_STATUS, bytes.clone()),
                None => json_response(404, json!({"message": "Not found"})),
            },
            (HttpMethod::Delete, path) => match self.stored.remove(path) {
                Some(_) => json_response(OK_STATUS, json!({})),
                None => json_response(404, json!({"message": "Not found"})),
            },
            (HttpMethod::Post, _) => json_response(404, json!({"message": "Not found"})),
        }
    }
}

fn status_response(status: u16) -> CameraResponse {
    if status == BUSY_STATUS {
        json_response(status, json!({"message": "Device busy"}))
    } else if status == OK_STATUS {
        json_response(status, json!({}))
    } else {
        json_response(status, json!({"message": "Operation failed"}))
    }
}

fn json_response(status: u16, body: Value) -> CameraResponse {
    CameraResponse::new(status, body.to_string().into_bytes())
}

impl CameraTransport for SimulatedCamera {
    fn execute(&mut self, request: &CameraRequest) -> Result<CameraResponse, CameraError> {
        if self.unreachable {
            return Err(CameraError::Unreachable {
                resource: request.resource.clone(),
                reason: "simulated network failure".to_string(),
            });
        }
        Ok(self.route(request))
    }
}
