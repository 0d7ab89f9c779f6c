//! CCAPI JSON payloads
//!
//! The camera omits keys it has nothing to report, so every field is
//! optional and callers decide which absences are fatal.

use super::resources::ShutterAction;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body for the manual shutter button resource
pub fn shutter_payload(action: ShutterAction, autofocus: bool) -> Value {
    json!({ "action": action.as_str(), "af": autofocus })
}

/// Error body returned alongside non-success statuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human readable reason
    #[serde(default)]
    pub message: Option<String>,
}

/// Contents of the event polling buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingEvents {
    /// Resource paths of files stored since the previous drain
    #[serde(default)]
    pub addedcontents: Option<Vec<String>>,
}

/// Battery status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Battery pack model
    #[serde(default)]
    pub name: Option<String>,
    /// Power source kind
    #[serde(default)]
    pub kind: Option<String>,
    /// Charge level
    #[serde(default)]
    pub level: Option<String>,
    /// Battery health
    #[serde(default)]
    pub quality: Option<String>,
}

/// Folder receiving new captures
///
/// Both fields are empty strings when no media is mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentDirectory {
    /// Folder name (e.g. `111STRB3`)
    #[serde(default)]
    pub name: Option<String>,
    /// Full resource path (e.g. `/ccapi/ver130/contents/sd/111STRB3`)
    #[serde(default)]
    pub path: Option<String>,
}

impl CurrentDirectory {
    /// Whether the camera has storage media mounted
    pub fn is_mounted(&self) -> bool {
        self.path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Entry count of a folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntryCount {
    /// Total entries in the folder
    #[serde(default)]
    pub contentsnumber: Option<u32>,
    /// Pages needed to list them (100 entries per page)
    #[serde(default)]
    pub pagenumber: Option<u32>,
}
