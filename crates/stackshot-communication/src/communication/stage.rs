//! Stage link
//!
//! Command/acknowledgment transport to the stage firmware. Every command is
//! written as one line, then response lines are drained until the terminal
//! `ok`. The firmware frees a buffer slot independently of command
//! completion, so motion helpers follow each move with `M400`.
//!
//! There is no retry and no read deadline at this layer: a transport
//! failure propagates to the caller, and a wedged firmware blocks the caller.

use super::serial::StagePort;
use crate::firmware::marlin::{
    format_command, is_acknowledgment, parse_position, MarlinCommand, MarlinResponse,
    MarlinResponseParser,
};
use stackshot_core::{
    LinkError, PartialPosition, ProtocolError, Result, StagePosition, Units,
};
use std::thread;
use std::time::Duration;

/// Line-buffered command/acknowledgment link to the stage
pub struct StageLink<P: StagePort> {
    port: P,
    parser: MarlinResponseParser,
    write_settle: Duration,
}

impl<P: StagePort> StageLink<P> {
    /// Wrap an open port
    pub fn new(port: P) -> Self {
        Self {
            port,
            parser: MarlinResponseParser::new(),
            write_settle: Duration::ZERO,
        }
    }

    /// Pause after each write before reading the reply
    pub fn with_write_settle(mut self, write_settle: Duration) -> Self {
        self.write_settle = write_settle;
        self
    }

    /// Borrow the underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Release the underlying port
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Send one command and drain its acknowledgment
    ///
    /// Returns the last non-terminal line read before `ok` (terminator
    /// included), or an empty string if the firmware answered with a bare
    /// `ok`. Nothing past the `ok` line is read.
    pub fn send(&mut self, command: &str) -> Result<String> {
        let line = format_command(command);
        let name = self.port.name();
        tracing::debug!("Sending stage command: {}", line.trim_end());

        self.port
            .write_line(&line)
            .map_err(|e| LinkError::WriteFailed {
                port: name.clone(),
                reason: e.to_string(),
            })?;

        if !self.write_settle.is_zero() {
            thread::sleep(self.write_settle);
        }

        let mut payload = String::new();
        loop {
            let response = self
                .port
                .read_line()
                .map_err(|e| LinkError::ReadFailed {
                    port: name.clone(),
                    reason: e.to_string(),
                })?;

            let Some(response) = response else {
                tracing::error!("Stage stream closed before acknowledging {}", line.trim_end());
                return Err(LinkError::Closed { port: name.clone() }.into());
            };

            tracing::debug!("Stage response: {:?}", response);
            if is_acknowledgment(&response) {
                break;
            }

            if let Some(MarlinResponse::Error(msg)) = self.parser.parse(&response) {
                tracing::warn!("Stage firmware reported error for {}: {}", line.trim_end(), msg);
            }
            payload = response;
        }

        Ok(payload)
    }

    /// Send a typed command; motion commands also wait for the planner
    fn execute(&mut self, command: MarlinCommand) -> Result<String> {
        let reply = self.send(&command.to_string())?;
        if command.is_motion() {
            self.wait_for_moves()?;
        }
        Ok(reply)
    }

    /// Block until every queued move has finished (`M400`)
    pub fn wait_for_moves(&mut self) -> Result<()> {
        self.execute(MarlinCommand::FinishMoves)?;
        Ok(())
    }

    /// Home the stage, optionally leaving Z alone, then wait for it
    pub fn home(&mut self, ignore_z: bool) -> Result<()> {
        tracing::info!("Homing stage (ignore_z={})", ignore_z);
        self.execute(MarlinCommand::Home { ignore_z })?;
        Ok(())
    }

    /// Switch to absolute positioning (`G90`)
    pub fn set_absolute_positioning(&mut self) -> Result<()> {
        self.execute(MarlinCommand::AbsolutePositioning)?;
        Ok(())
    }

    /// Switch to relative positioning (`G91`)
    pub fn set_relative_positioning(&mut self) -> Result<()> {
        self.execute(MarlinCommand::RelativePositioning)?;
        Ok(())
    }

    /// Select coordinate units
    pub fn set_units(&mut self, units: Units) -> Result<()> {
        self.execute(MarlinCommand::SetUnits(units))?;
        Ok(())
    }

    /// Fast reposition with no feed rate control, then wait for it
    pub fn quick_move(&mut self, target: PartialPosition) -> Result<()> {
        if target.is_empty() {
            return Ok(());
        }
        self.execute(MarlinCommand::RapidMove(target))?;
        Ok(())
    }

    /// Precision move at `feed_rate` mm/min, then wait for it
    pub fn controlled_move(&mut self, target: PartialPosition, feed_rate: f64) -> Result<()> {
        if target.is_empty() {
            return Ok(());
        }
        self.execute(MarlinCommand::LinearMove { target, feed_rate })?;
        Ok(())
    }

    /// Redefine the current position without moving (`G92`)
    pub fn set_position(&mut self, target: PartialPosition) -> Result<()> {
        self.execute(MarlinCommand::SetPosition(target))?;
        Ok(())
    }

    /// Make the current XY position the logical origin; Z is unchanged
    pub fn set_origin(&mut self) -> Result<()> {
        self.set_position(PartialPosition::xy(0.0, 0.0))
    }

    /// Move back to the logical XY origin and resume relative positioning
    pub fn return_to_origin(&mut self, feed_rate: f64) -> Result<()> {
        self.set_absolute_positioning()?;
        self.controlled_move(PartialPosition::xy(0.0, 0.0), feed_rate)?;
        self.set_relative_positioning()
    }

    /// Query the current position (`M114`)
    pub fn query_position(&mut self) -> Result<StagePosition> {
        let report = self.execute(MarlinCommand::ReportPosition)?;
        parse_position(&report).ok_or_else(|| {
            ProtocolError::MalformedPosition {
                line: report.trim_end().to_string(),
            }
            .into()
        })
    }

    /// Play the completion tone
    pub fn beep(&mut self) -> Result<()> {
        self.execute(MarlinCommand::completion_beep())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackshot_core::{Axis, Error};
    use std::collections::VecDeque;
    use std::io;

    struct ScriptedPort {
        written: Vec<String>,
        responses: VecDeque<String>,
        fail_writes: bool,
    }

    impl ScriptedPort {
        fn new(responses: &[&str]) -> Self {
            Self {
                written: Vec::new(),
                responses: responses.iter().map(|s| s.to_string()).collect(),
                fail_writes: false,
            }
        }
    }

    impl StagePort for ScriptedPort {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.push(line.to_string());
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<Option<String>> {
            Ok(self.responses.pop_front())
        }

        fn name(&self) -> String {
            "scripted".to_string()
        }
    }

    #[test]
    fn test_send_returns_last_line_before_ok() {
        let mut link = StageLink::new(ScriptedPort::new(&["echo:busy\n", "ok\n", "leftover\n"]));
        let ack = link.send("G28 X Y").unwrap();
        assert_eq!(ack, "echo:busy\n");
        // Nothing after the ok token was consumed
        assert_eq!(link.port().responses, VecDeque::from(vec!["leftover\n".to_string()]));
        assert_eq!(link.port().written, vec!["G28 X Y\r\n".to_string()]);
    }

    #[test]
    fn test_send_bare_ok_returns_empty() {
        let mut link = StageLink::new(ScriptedPort::new(&["ok\n"]));
        assert_eq!(link.send("G90").unwrap(), "");
    }

    #[test]
    fn test_send_keeps_last_of_many_lines() {
        let mut link = StageLink::new(ScriptedPort::new(&["first\n", "second\n", "ok\n"]));
        assert_eq!(link.send("M115").unwrap(), "second\n");
    }

    #[test]
    fn test_stream_closed_before_ok_is_link_failure() {
        let mut link = StageLink::new(ScriptedPort::new(&["echo:busy\n"]));
        let err = link.send("M400").unwrap_err();
        assert!(err.is_link_failure());
        assert!(matches!(err, Error::Link(LinkError::Closed { ref port }) if port == "scripted"));
    }

    #[test]
    fn test_write_failure_is_link_failure() {
        let mut port = ScriptedPort::new(&["ok\n"]);
        port.fail_writes = true;
        let mut link = StageLink::new(port);
        let err = link.send("G90").unwrap_err();
        assert!(matches!(err, Error::Link(LinkError::WriteFailed { .. })));
    }

    #[test]
    fn test_controlled_move_waits_for_buffer_drain() {
        let mut link = StageLink::new(ScriptedPort::new(&["ok\n", "ok\n"]));
        link.controlled_move(PartialPosition::along(Axis::Y, 1.58), 120.0)
            .unwrap();
        assert_eq!(
            link.port().written,
            vec!["G1 Y1.58 F120\r\n".to_string(), "M400\r\n".to_string()]
        );
    }

    #[test]
    fn test_home_ignoring_z() {
        let mut link = StageLink::new(ScriptedPort::new(&["ok\n", "ok\n"]));
        link.home(true).unwrap();
        assert_eq!(
            link.port().written,
            vec!["G28 X Y\r\n".to_string(), "M400\r\n".to_string()]
        );
    }

    #[test]
    fn test_query_position() {
        let mut link = StageLink::new(ScriptedPort::new(&[
            "X:10.00 Y:20.00 Z:40.00 E:0.00 Count X:800 Y:1600 Z:16000\n",
            "ok\n",
        ]));
        let pos = link.query_position().unwrap();
        assert_eq!(pos, StagePosition::new(10.0, 20.0, 40.0));
    }

    #[test]
    fn test_query_position_malformed() {
        let mut link = StageLink::new(ScriptedPort::new(&["ok\n"]));
        let err = link.query_position().unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MalformedPosition { .. })
        ));
    }

    #[test]
    fn test_return_to_origin_sequence() {
        let mut link = StageLink::new(ScriptedPort::new(&["ok\n"; 4]));
        link.return_to_origin(120.0).unwrap();
        assert_eq!(
            link.port().written,
            vec![
                "G90\r\n".to_string(),
                "G1 X0 Y0 F120\r\n".to_string(),
                "M400\r\n".to_string(),
                "G91\r\n".to_string(),
            ]
        );
    }
}
