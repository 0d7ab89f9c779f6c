//! Marlin firmware protocol
//!
//! Command creation and response parsing for the Marlin printer firmware
//! driving the stage. Marlin acknowledges every line with `ok` once its
//! planner buffer has a free slot, which is not the same as the move having
//! finished; `M400` blocks until the planner queue is empty.

pub mod command_creator;
pub mod response_parser;

pub use command_creator::{format_command, MarlinCommand, LINE_ENDING};
pub use response_parser::{is_acknowledgment, parse_position, MarlinResponse, MarlinResponseParser};
