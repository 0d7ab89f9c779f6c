//! Camera Control API (CCAPI)
//!
//! Resource paths, status codes and JSON payloads of the camera's REST
//! control surface.

pub mod payloads;
pub mod resources;

pub use payloads::{
    shutter_payload, BatteryStatus, CurrentDirectory, DirectoryEntryCount, ErrorMessage,
    PollingEvents,
};
pub use resources::{ShutterAction, BUSY_STATUS, OK_STATUS};
