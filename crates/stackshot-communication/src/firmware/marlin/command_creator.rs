//! Marlin Command Creator
//!
//! Builds the G-code and M-code lines used to drive the stage. Every
//! command is a single ASCII line; [`format_command`] appends the line
//! terminator expected by the firmware.

use stackshot_core::{PartialPosition, Units};
use std::fmt;

/// Line terminator appended to every command
pub const LINE_ENDING: &str = "\r\n";

/// Commands understood by the stage firmware
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarlinCommand {
    /// `G28`: home axes against their end stops
    Home {
        /// Leave the vertical rail where it is
        ignore_z: bool,
    },
    /// `G90`: absolute positioning
    AbsolutePositioning,
    /// `G91`: relative positioning
    RelativePositioning,
    /// `G0`: rapid move with no feed rate
    RapidMove(PartialPosition),
    /// `G1`: move at an explicit feed rate (mm/min)
    LinearMove {
        /// Target (absolute or relative depending on the positioning mode)
        target: PartialPosition,
        /// Feed rate in mm/min
        feed_rate: f64,
    },
    /// `G92`: redefine the current position without moving
    SetPosition(PartialPosition),
    /// `M400`: block until the planner queue is empty
    FinishMoves,
    /// `M114`: report current position
    ReportPosition,
    /// `G20`/`G21`: unit selection
    SetUnits(Units),
    /// `M300`: play a tone
    Beep {
        /// Tone frequency in Hz
        frequency_hz: u32,
        /// Tone duration in ms
        duration_ms: u32,
    },
}

impl MarlinCommand {
    /// Tone played when a sequence completes
    pub fn completion_beep() -> Self {
        MarlinCommand::Beep {
            frequency_hz: 440,
            duration_ms: 200,
        }
    }

    /// Whether the command queues motion that `M400` must wait for
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            MarlinCommand::Home { .. }
                | MarlinCommand::RapidMove(_)
                | MarlinCommand::LinearMove { .. }
        )
    }
}

fn write_axes(f: &mut fmt::Formatter<'_>, target: &PartialPosition) -> fmt::Result {
    for (axis, value) in target.axes() {
        write!(f, " {}{}", axis.letter(), value)?;
    }
    Ok(())
}

impl fmt::Display for MarlinCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home { ignore_z: true } => write!(f, "G28 X Y"),
            Self::Home { ignore_z: false } => write!(f, "G28"),
            Self::AbsolutePositioning => write!(f, "G90"),
            Self::RelativePositioning => write!(f, "G91"),
            Self::RapidMove(target) => {
                write!(f, "G0")?;
                write_axes(f, target)
            }
            Self::LinearMove { target, feed_rate } => {
                write!(f, "G1")?;
                write_axes(f, target)?;
                write!(f, " F{}", feed_rate)
            }
            Self::SetPosition(target) => {
                write!(f, "G92")?;
                write_axes(f, target)
            }
            Self::FinishMoves => write!(f, "M400"),
            Self::ReportPosition => write!(f, "M114"),
            Self::SetUnits(Units::MM) => write!(f, "G21"),
            Self::SetUnits(Units::INCH) => write!(f, "G20"),
            Self::Beep {
                frequency_hz,
                duration_ms,
            } => write!(f, "M300 S{} P{}", frequency_hz, duration_ms),
        }
    }
}

/// Format a command for transmission
pub fn format_command(command: &str) -> String {
    let trimmed = command.trim_end_matches(['\r', '\n']);
    format!("{}{}", trimmed, LINE_ENDING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackshot_core::Axis;

    #[test]
    fn test_home_commands() {
        assert_eq!(MarlinCommand::Home { ignore_z: true }.to_string(), "G28 X Y");
        assert_eq!(MarlinCommand::Home { ignore_z: false }.to_string(), "G28");
    }

    #[test]
    fn test_move_commands() {
        let cmd = MarlinCommand::RapidMove(PartialPosition::xyz(0.0, 120.0, 190.0));
        assert_eq!(cmd.to_string(), "G0 X0 Y120 Z190");

        let cmd = MarlinCommand::LinearMove {
            target: PartialPosition::along(Axis::Y, -1.58),
            feed_rate: 120.0,
        };
        assert_eq!(cmd.to_string(), "G1 Y-1.58 F120");
        assert!(cmd.is_motion());
    }

    #[test]
    fn test_set_position_leaves_unset_axes() {
        let cmd = MarlinCommand::SetPosition(PartialPosition::xy(0.0, 0.0));
        assert_eq!(cmd.to_string(), "G92 X0 Y0");
        assert!(!cmd.is_motion());
    }

    #[test]
    fn test_misc_commands() {
        assert_eq!(MarlinCommand::FinishMoves.to_string(), "M400");
        assert_eq!(MarlinCommand::ReportPosition.to_string(), "M114");
        assert_eq!(MarlinCommand::SetUnits(Units::MM).to_string(), "G21");
        assert_eq!(MarlinCommand::SetUnits(Units::INCH).to_string(), "G20");
        assert_eq!(MarlinCommand::completion_beep().to_string(), "M300 S440 P200");
    }

    #[test]
    fn test_format_command_terminates_once() {
        assert_eq!(format_command("G90"), "G90\r\n");
        assert_eq!(format_command("G90\r\n"), "G90\r\n");
        assert_eq!(format_command("M114\n"), "M114\r\n");
    }
}
