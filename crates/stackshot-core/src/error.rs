//! Error handling for StackShot
//!
//! Provides error types for every layer that talks to hardware or validates
//! operator input:
//! - Link errors (serial transport to the stage)
//! - Camera errors (bounded HTTP calls, busy/rejected shutter actions)
//! - Protocol errors (responses that do not match the expected format)
//! - Plan errors (rejected optical/geometric parameters)
//! - Controller errors (sequencing state machine violations)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport-level failure on a device link.
///
/// A link failure is always fatal to the operation that raised it and is
/// never retried: a stuck serial link is indistinguishable from a stalled
/// firmware.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Failed to open the port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Writing a command line failed
    #[error("Write to {port} failed: {reason}")]
    WriteFailed {
        /// The port being written.
        port: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Reading a response line failed
    #[error("Read from {port} failed: {reason}")]
    ReadFailed {
        /// The port being read.
        port: String,
        /// The reason for the failure.
        reason: String,
    },

    /// The peer closed the stream
    #[error("Connection to {port} closed")]
    Closed {
        /// The port that was closed.
        port: String,
    },
}

/// Camera control failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The bounded request did not complete in time
    #[error("Camera request {resource} timed out")]
    Timeout {
        /// The resource that was requested.
        resource: String,
    },

    /// The camera could not be reached at all
    #[error("Camera unreachable for {resource}: {reason}")]
    Unreachable {
        /// The resource that was requested.
        resource: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A call returned no response (timeout or connection failure already logged)
    #[error("No response from camera for {action}")]
    NoResponse {
        /// The action that went unanswered.
        action: String,
    },

    /// The camera answered with a non-success, non-busy status
    #[error("Camera rejected {action}: status {status}{}", detail(.message))]
    Rejected {
        /// The action that was rejected.
        action: String,
        /// HTTP status code.
        status: u16,
        /// Device supplied message, if any.
        message: Option<String>,
    },

    /// The camera stayed busy for every permitted attempt
    #[error("Camera still busy after {attempts} attempts")]
    BusyRetriesExhausted {
        /// Number of press attempts issued.
        attempts: u32,
    },
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

/// Response did not match the expected protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A position report could not be parsed
    #[error("Malformed position report: {line:?}")]
    MalformedPosition {
        /// The offending line.
        line: String,
    },

    /// A JSON body could not be decoded
    #[error("Malformed response from {resource}: {reason}")]
    MalformedResponse {
        /// The resource that answered.
        resource: String,
        /// The decode failure.
        reason: String,
    },

    /// A required field was absent from a response
    #[error("Response from {resource} is missing field {field}")]
    MissingField {
        /// The resource that answered.
        resource: String,
        /// The missing field name.
        field: String,
    },
}

/// Rejected shot planning input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// A parameter was zero, negative or not finite
    #[error("Invalid parameter '{name}': {value} ({reason})")]
    InvalidParameter {
        /// The parameter name.
        name: &'static str,
        /// The rejected value.
        value: f64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The computed stacking increment rounded to zero
    #[error("Stacking increment rounds to zero for depth of field {depth_of_field}mm")]
    ZeroIncrement {
        /// The depth of field that produced the increment.
        depth_of_field: f64,
    },

    /// The subject needs more exposures than a run can count
    #[error("Subject spans {spans} increments, more than the limit of {max}")]
    TooManyShots {
        /// Whole increments in the subject length.
        spans: f64,
        /// Largest accepted span count.
        max: u32,
    },
}

/// Controller error type
///
/// Represents violations of the acquisition state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Invalid state transition
    #[error("Invalid state transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The current state name.
        current: String,
        /// The requested state name.
        requested: String,
    },
}

/// Main error type for StackShot
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Device link error
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Camera error
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Planning error
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Camera(CameraError::Timeout { .. }))
    }

    /// Check if this is a transport failure on the stage link
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Error::Link(_))
    }

    /// Check if the camera stayed busy past the configured cap
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Camera(CameraError::BusyRetriesExhausted { .. }))
    }

    /// Check if this is a protocol mismatch
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Check if this is a camera error
    pub fn is_camera_error(&self) -> bool {
        matches!(self, Error::Camera(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
