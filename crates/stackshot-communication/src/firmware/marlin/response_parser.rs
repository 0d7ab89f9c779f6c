//! Marlin Response Parser
//!
//! Classifies response lines from the stage firmware and extracts the
//! position report produced by `M114`.

use stackshot_core::StagePosition;
use std::fmt;

/// Marlin response types
#[derive(Debug, Clone, PartialEq)]
pub enum MarlinResponse {
    /// `ok`: the planner buffer has a free slot
    Ok,
    /// `echo:busy: ...` keep-alive while a long command runs
    Busy(String),
    /// `Error:...` reported by the firmware
    Error(String),
    /// `X:.. Y:.. Z:..` position report
    Position(StagePosition),
    /// Any other `echo:` line
    Echo(String),
    /// Startup banner or other text
    Message(String),
}

impl fmt::Display for MarlinResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Busy(msg) => write!(f, "busy:{}", msg),
            Self::Error(msg) => write!(f, "error:{}", msg),
            Self::Position(pos) => write!(f, "position:{}", pos),
            Self::Echo(msg) => write!(f, "echo:{}", msg),
            Self::Message(msg) => write!(f, "message:{}", msg),
        }
    }
}

/// Check whether a raw line is the terminal acknowledgment token
pub fn is_acknowledgment(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == "ok"
}

/// Parse an `M114` position report
///
/// Example: `X:1.00 Y:10.01 Z:175.00 E:0.00 Count X:3200 Y:6000 Z:70000`.
/// Splitting on `:` leaves each coordinate followed by the next field's
/// label (`"1.00 Y"`); only the leading number of fields 1 to 3 is used.
pub fn parse_position(line: &str) -> Option<StagePosition> {
    let fields: Vec<&str> = line.trim().split(':').collect();
    if fields.len() < 4 || fields[0].trim() != "X" {
        return None;
    }

    let coordinate = |field: &str| -> Option<f64> {
        field.split_whitespace().next()?.parse::<f64>().ok()
    };

    Some(StagePosition {
        x: coordinate(fields[1])?,
        y: coordinate(fields[2])?,
        z: coordinate(fields[3])?,
    })
}

/// Marlin response parser
#[derive(Debug, Default)]
pub struct MarlinResponseParser;

impl MarlinResponseParser {
    /// Create a new Marlin response parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a Marlin response line
    pub fn parse(&self, line: &str) -> Option<MarlinResponse> {
        let line = line.trim();

        if line.is_empty() {
            return None;
        }

        if line == "ok" {
            return Some(MarlinResponse::Ok);
        }

        if let Some(stripped) = line.strip_prefix("echo:busy:") {
            return Some(MarlinResponse::Busy(stripped.trim().to_string()));
        }

        if let Some(stripped) = line.strip_prefix("Error:") {
            return Some(MarlinResponse::Error(stripped.trim().to_string()));
        }

        if let Some(stripped) = line.strip_prefix("echo:") {
            return Some(MarlinResponse::Echo(stripped.trim().to_string()));
        }

        if let Some(position) = parse_position(line) {
            return Some(MarlinResponse::Position(position));
        }

        Some(MarlinResponse::Message(line.to_string()))
    }
}
