//! Device communication
//!
//! - `serial`: line-oriented serial transport to the stage
//! - `stage`: command/acknowledgment discipline and motion helpers
//! - `http`: bounded HTTP transport to the camera
//! - `camera`: shutter control, event draining and content access

pub mod camera;
pub mod http;
pub mod serial;
pub mod stage;

pub use camera::{BusyRetryPolicy, CameraEventBatch, CameraLink, ShutterReport};
pub use http::{CameraRequest, CameraResponse, CameraTransport, HttpCameraTransport, HttpMethod};
pub use serial::{list_ports, RealSerialPort, SerialPortInfo, StagePort};
pub use stage::StageLink;
