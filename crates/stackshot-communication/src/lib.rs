//! # StackShot Communication
//!
//! Device links for StackShot.
//! The stage is a Marlin printer board reached over USB serial; the camera
//! is reached over HTTP through its REST control API. Both links are
//! synchronous and owned by a single caller.

pub mod communication;
pub mod firmware;
pub mod simulation;

pub use communication::{
    list_ports, BusyRetryPolicy, CameraEventBatch, CameraLink, CameraRequest, CameraResponse,
    CameraTransport, HttpCameraTransport, HttpMethod, RealSerialPort, SerialPortInfo,
    ShutterReport, StageLink, StagePort,
};

pub use firmware::ccapi::{BatteryStatus, CurrentDirectory, DirectoryEntryCount};
pub use firmware::marlin::{MarlinCommand, MarlinResponse, MarlinResponseParser};

pub use simulation::{DeviceAction, DeviceJournal, SimulatedCamera, SimulatedStagePort};
