//! seat-link - serial link, framing and dispatch for the seat controller ECU
//!
//! Layers, bottom-up:
//! - `transport`: opens the port and runs the reader/sender threads
//! - `codec`: standard and legacy frame formats, stream reassembly
//! - `protocol`: command table, typed commands and decoded messages
//! - `session`: command surface, dispatch to events, statistics
//!
//! Front-ends consume [`events::Event`]s from the channel returned by
//! [`session::Session::new`].

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::{Result, SeatLinkError};
pub use events::Event;
pub use session::Session;
