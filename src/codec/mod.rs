//! Codec abstraction for frame encoding/decoding
//!
//! Separates framing concerns from transport:
//! - **Codec**: How a `(command id, payload)` pair maps to wire bytes
//! - **Stream**: How a raw byte stream is split into frames and debug text
//!
//! Two framing profiles exist on the seat controller bus:
//! - `StandardCodec`: length-prefixed frames with XOR checksum
//! - `LegacyCodec`: fixed 12-byte frames used by the EEPROM programmer
//!
//! Both decode into the same `Frame` value, so the dispatcher does not care
//! which profile is active.

pub mod legacy;
pub mod standard;
pub mod stream;

pub use legacy::LegacyCodec;
pub use standard::StandardCodec;
pub use stream::{StreamDecoder, StreamItem};

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Decoded frame: command id plus its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command_id: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(command_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command_id,
            payload: payload.into(),
        }
    }
}

/// Codec trait for framing profiles
///
/// Implementations are pure: no I/O, no internal buffering.
pub trait Codec: Send + Sync {
    /// Profile name used in traces and errors
    fn name(&self) -> &'static str;

    /// Encode a frame, appending the wire bytes to `output`
    fn encode(&self, command_id: u8, payload: &[u8], output: &mut Vec<u8>) -> Result<()>;

    /// Try to decode one frame at the start of `buffer`
    ///
    /// Returns `Ok(None)` while the frame is incomplete, and the frame plus
    /// the number of bytes it occupied once complete.
    fn try_decode_one(&self, buffer: &[u8]) -> Result<Option<(Frame, usize)>>;

    /// Total size of the frame starting at `buffer[0]`, if the header says so
    ///
    /// Used to discard a rejected frame as a whole.
    fn declared_len(&self, buffer: &[u8]) -> Option<usize>;
}

/// Framing profile selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodecProfile {
    /// Length-prefixed frames with checksum
    #[default]
    Standard,
    /// Fixed 12-byte EEPROM programmer frames
    Legacy,
}

/// Boxed codecs forward to the inner implementation
impl Codec for Box<dyn Codec> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encode(&self, command_id: u8, payload: &[u8], output: &mut Vec<u8>) -> Result<()> {
        (**self).encode(command_id, payload, output)
    }

    fn try_decode_one(&self, buffer: &[u8]) -> Result<Option<(Frame, usize)>> {
        (**self).try_decode_one(buffer)
    }

    fn declared_len(&self, buffer: &[u8]) -> Option<usize> {
        (**self).declared_len(buffer)
    }
}

/// XOR of every byte
#[inline]
pub fn xor_checksum(command_id: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(command_id, |acc, &b| acc ^ b)
}

/// Format bytes as `7E 00 1F` (uppercase, space separated)
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    out
}
