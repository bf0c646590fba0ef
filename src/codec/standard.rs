//! Length-prefixed frame codec
//!
//! ```text
//! [0]      header 0x7E
//! [1..4]   length: u32 big-endian = payload.len() + 1
//! [5]      command id
//! [6..]    payload
//! [n-2]    checksum: XOR of command id and payload
//! [n-1]    tail 0x7F
//! ```

use super::{xor_checksum, Codec, Frame};
use crate::constants::{
    DEFAULT_MAX_PAYLOAD, FRAME_HEADER, FRAME_PREFIX_SIZE, FRAME_TAIL, MIN_FRAME_SIZE,
};
use crate::error::{Result, SeatLinkError};
use bytes::Bytes;

/// Codec for the general length-prefixed framing
#[derive(Debug, Clone)]
pub struct StandardCodec {
    verify_checksum: bool,
    max_payload: usize,
}

impl StandardCodec {
    pub fn new(verify_checksum: bool, max_payload: usize) -> Self {
        Self {
            verify_checksum,
            max_payload,
        }
    }

    /// Largest value the length field may carry
    fn max_length(&self) -> usize {
        self.max_payload + 1
    }

    /// Read the length field (requires at least 5 bytes)
    fn length_field(buffer: &[u8]) -> usize {
        u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]) as usize
    }
}

impl Default for StandardCodec {
    fn default() -> Self {
        Self::new(true, DEFAULT_MAX_PAYLOAD)
    }
}

/// Encode a frame with the standard layout
pub fn encode(command_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + MIN_FRAME_SIZE);
    encode_into(command_id, payload, &mut out);
    out
}

fn encode_into(command_id: u8, payload: &[u8], out: &mut Vec<u8>) {
    out.push(FRAME_HEADER);
    out.extend_from_slice(&((payload.len() + 1) as u32).to_be_bytes());
    out.push(command_id);
    out.extend_from_slice(payload);
    out.push(xor_checksum(command_id, payload));
    out.push(FRAME_TAIL);
}

impl Codec for StandardCodec {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn encode(&self, command_id: u8, payload: &[u8], output: &mut Vec<u8>) -> Result<()> {
        if payload.len() > u32::MAX as usize - 1 {
            return Err(SeatLinkError::BadLength {
                length: payload.len() + 1,
                max: u32::MAX as usize,
            });
        }
        encode_into(command_id, payload, output);
        Ok(())
    }

    fn try_decode_one(&self, buffer: &[u8]) -> Result<Option<(Frame, usize)>> {
        let Some(&first) = buffer.first() else {
            return Ok(None);
        };
        if first != FRAME_HEADER {
            return Err(SeatLinkError::MissingHeader { found: first });
        }
        if buffer.len() < MIN_FRAME_SIZE {
            return Ok(None);
        }

        let length = Self::length_field(buffer);
        if length == 0 || length > self.max_length() {
            return Err(SeatLinkError::BadLength {
                length,
                max: self.max_length(),
            });
        }

        let total = FRAME_PREFIX_SIZE + length + 2;
        if buffer.len() < total {
            return Ok(None);
        }

        let command_id = buffer[FRAME_PREFIX_SIZE];
        let payload = &buffer[FRAME_PREFIX_SIZE + 1..FRAME_PREFIX_SIZE + length];
        let checksum = buffer[total - 2];
        let tail = buffer[total - 1];

        if tail != FRAME_TAIL {
            return Err(SeatLinkError::BadTail { found: tail });
        }

        if self.verify_checksum {
            let expected = xor_checksum(command_id, payload);
            if checksum != expected {
                return Err(SeatLinkError::ChecksumMismatch {
                    expected,
                    found: checksum,
                });
            }
        }

        let frame = Frame::new(command_id, Bytes::copy_from_slice(payload));
        Ok(Some((frame, total)))
    }

    fn declared_len(&self, buffer: &[u8]) -> Option<usize> {
        if buffer.len() < FRAME_PREFIX_SIZE || buffer[0] != FRAME_HEADER {
            return None;
        }
        let length = Self::length_field(buffer);
        (length > 0 && length <= self.max_length()).then_some(FRAME_PREFIX_SIZE + length + 2)
    }
}
