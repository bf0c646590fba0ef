//! Fixed-size frame codec used by the EEPROM programmer
//!
//! ```text
//! [0]      header 0x7E
//! [1..4]   00 00 00 05 (constant length placeholder)
//! [5]      command id
//! [6..9]   address: u32 big-endian
//! [10]     value
//! [11]     tail 0x7F
//! ```
//!
//! There is no checksum. Payloads are normalized to the standard layout on
//! decode, so the dispatcher sees the same bytes under either profile:
//! write acknowledgements carry only the status byte, everything else
//! becomes `u32 address (LE), u8 value`.

use super::{Codec, Frame};
use crate::constants::{FRAME_HEADER, FRAME_TAIL, LEGACY_FRAME_SIZE};
use crate::error::{Result, SeatLinkError};
use crate::protocol::registry::{WRITE_ALL_RESPONSE, WRITE_BYTE_RESPONSE};

const LENGTH_PLACEHOLDER: [u8; 4] = [0x00, 0x00, 0x00, 0x05];
const MAX_PAYLOAD: usize = 5;

/// Codec for the 12-byte legacy framing
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyCodec;

impl Codec for LegacyCodec {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn encode(&self, command_id: u8, payload: &[u8], output: &mut Vec<u8>) -> Result<()> {
        if payload.len() > MAX_PAYLOAD {
            return Err(SeatLinkError::UnsupportedByProfile {
                profile: self.name(),
                reason: format!(
                    "payload of {} bytes exceeds {} bytes",
                    payload.len(),
                    MAX_PAYLOAD
                ),
            });
        }

        let mut address = [0u8; 4];
        let addr_len = payload.len().min(4);
        address[..addr_len].copy_from_slice(&payload[..addr_len]);
        let address = u32::from_le_bytes(address);
        let value = payload.get(4).copied().unwrap_or(0);

        output.push(FRAME_HEADER);
        output.extend_from_slice(&LENGTH_PLACEHOLDER);
        output.push(command_id);
        output.extend_from_slice(&address.to_be_bytes());
        output.push(value);
        output.push(FRAME_TAIL);
        Ok(())
    }

    fn try_decode_one(&self, buffer: &[u8]) -> Result<Option<(Frame, usize)>> {
        let Some(&first) = buffer.first() else {
            return Ok(None);
        };
        if first != FRAME_HEADER {
            return Err(SeatLinkError::MissingHeader { found: first });
        }
        if buffer.len() < LEGACY_FRAME_SIZE {
            return Ok(None);
        }

        let tail = buffer[LEGACY_FRAME_SIZE - 1];
        if tail != FRAME_TAIL {
            return Err(SeatLinkError::BadTail { found: tail });
        }
        if buffer[1..5] != LENGTH_PLACEHOLDER {
            let length = u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]);
            return Err(SeatLinkError::BadLength {
                length: length as usize,
                max: MAX_PAYLOAD,
            });
        }

        let command_id = buffer[5];
        let value = buffer[10];
        let payload = match command_id {
            // Status byte rides in the value slot, the address is padding
            WRITE_BYTE_RESPONSE | WRITE_ALL_RESPONSE => vec![value],
            _ => {
                let address = u32::from_be_bytes([buffer[6], buffer[7], buffer[8], buffer[9]]);
                let mut payload = Vec::with_capacity(MAX_PAYLOAD);
                payload.extend_from_slice(&address.to_le_bytes());
                payload.push(value);
                payload
            }
        };

        Ok(Some((Frame::new(command_id, payload), LEGACY_FRAME_SIZE)))
    }

    fn declared_len(&self, buffer: &[u8]) -> Option<usize> {
        (buffer.first() == Some(&FRAME_HEADER)).then_some(LEGACY_FRAME_SIZE)
    }
}
