//! Seat controller application protocol
//!
//! - [`registry`]: static command table (ids, payload layouts, responses)
//! - [`units`]: the two fixed-point scales used on the wire
//! - [`command`]: typed outgoing commands
//! - [`message`]: typed incoming messages

pub mod command;
pub mod message;
pub mod registry;
pub mod units;

pub use command::{Command, FaultNumber};
pub use message::{EepromOperation, EepromResponse, Message, ProfileData};
pub use units::{SeatAxis, SeatPosition};
