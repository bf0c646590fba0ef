//! Byte-level I/O for the seat controller link
//!
//! Separates I/O concerns from protocol logic:
//! - **Connector**: How a port is opened (OS serial port, in-memory mock...)
//! - **Link**: Threads, send queue and connection state around an open port
//!
//! Framing and dispatch are handled elsewhere; the link only moves bytes.

pub mod link;
pub mod serial;

pub use link::{ConnectionState, Link};
pub use serial::SerialConnector;

use crate::config::LinkConfig;
use crate::error::Result;
use std::io::{Read, Write};

/// Independent read and write halves of an open port
///
/// The reader must honour a read timeout (returning `ErrorKind::TimedOut`)
/// so the receive thread can notice shutdown.
pub struct PortPair {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

/// Opens ports for a [`Link`]
///
/// # Errors
///
/// - `PortNotFound` - the named port does not exist
/// - `OpenFailed` - the OS refused to open it
pub trait Connector: Send + Sync {
    fn open(&self, settings: &LinkConfig) -> Result<PortPair>;
}

/// Receives every chunk read from the port, in arrival order
pub type ByteSink = Box<dyn FnMut(&[u8]) + Send>;
