//! CCAPI resource paths and status codes

use std::fmt;

/// API root, used to check the session
pub const ROOT: &str = "/ccapi";
/// Battery status of the device
pub const BATTERY: &str = "/ccapi/ver100/devicestatus/battery";
/// Folder receiving new captures
pub const CURRENT_DIRECTORY: &str = "/ccapi/ver110/devicestatus/currentdirectory";
/// Manual shutter button control
pub const SHUTTER_BUTTON_MANUAL: &str = "/ccapi/ver100/shooting/control/shutterbutton/manual";
/// Event polling buffer (destructive read)
pub const EVENT_POLLING: &str = "/ccapi/ver100/event/polling";
/// Query suffix returning entry and page counts of a folder
pub const ENTRY_COUNT_QUERY: &str = "?kind=number";

/// Request accepted
pub const OK_STATUS: u16 = 200;
/// Device busy with a previous operation (e.g. still storing an image)
pub const BUSY_STATUS: u16 = 503;

/// Shutter button actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterAction {
    /// Press the button all the way down
    FullPress,
    /// Release the button
    Release,
}

impl ShutterAction {
    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutterAction::FullPress => "full_press",
            ShutterAction::Release => "release",
        }
    }
}

impl fmt::Display for ShutterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry-count query path for a folder
pub fn entry_count_path(folder: &str) -> String {
    format!("{}{}", folder, ENTRY_COUNT_QUERY)
}
