//! Incoming messages
//!
//! [`Message::parse`] turns a validated frame into a typed message. Ids
//! without an incoming meaning return `Ok(None)`; payloads shorter than the
//! registry requires return `MalformedPayload`.

use super::registry;
use super::units::{SeatAxis, SeatPosition};
use crate::codec::{hex_dump, Frame};
use crate::constants::HEX_PREVIEW_BYTES;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// EEPROM operation a response belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EepromOperation {
    ReadByte,
    WriteByte,
    ReadAll,
    WriteAll,
}

/// Answer to an EEPROM request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EepromResponse {
    pub operation: EepromOperation,
    /// Only set for single-byte reads
    pub address: Option<u32>,
    pub data: Vec<u8>,
    pub success: bool,
}

/// Stored seat profile reported by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    pub id: u8,
    pub position: SeatPosition,
    /// EEPROM address, when the load was requested by address
    pub address: Option<u16>,
}

/// Structured message decoded from a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Eeprom(EepromResponse),
    Alive {
        timestamp_ms: u16,
        counter: u16,
    },
    Gearbox {
        gear: u16,
        current_torque: u16,
        max_torque: u16,
    },
    SeatTarget {
        axis: SeatAxis,
        value: f64,
    },
    SeatCurrent {
        axis: SeatAxis,
        value: f64,
    },
    Fault {
        number: u8,
        timestamp_ms: u32,
    },
    Profile(ProfileData),
}

/// Little-endian cursor over a payload already checked against its descriptor
struct Fields<'a> {
    data: &'a [u8],
}

impl Fields<'_> {
    fn u8(&mut self) -> u8 {
        let value = self.data[0];
        self.data = &self.data[1..];
        value
    }

    fn pair(&mut self) -> [u8; 2] {
        let value = [self.data[0], self.data[1]];
        self.data = &self.data[2..];
        value
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.pair())
    }

    fn u32(&mut self) -> u32 {
        let value = u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]);
        self.data = &self.data[4..];
        value
    }
}

/// Check the payload against the descriptor of `id`
fn checked(id: u8, payload: &[u8]) -> Result<Fields<'_>> {
    let descriptor = match id {
        registry::LOAD_PROFILE => Some(&registry::PROFILE_DATA_ECHO),
        _ => registry::lookup(id),
    };
    if let Some(descriptor) = descriptor {
        descriptor.check_payload(payload)?;
    }
    Ok(Fields { data: payload })
}

fn telemetry(axis: SeatAxis, id: u8, payload: &[u8]) -> Result<f64> {
    let mut fields = checked(id, payload)?;
    Ok(axis.telemetry_value(fields.pair()))
}

impl Message {
    /// Decode a frame, `Ok(None)` for ids with no incoming meaning
    pub fn parse(frame: &Frame) -> Result<Option<Message>> {
        use registry::*;

        let id = frame.command_id;
        let payload = frame.payload.as_ref();

        let message = match id {
            READ_BYTE_RESPONSE => {
                let mut f = checked(id, payload)?;
                let address = f.u32();
                let value = f.u8();
                Message::Eeprom(EepromResponse {
                    operation: EepromOperation::ReadByte,
                    address: Some(address),
                    data: vec![value],
                    success: true,
                })
            }
            WRITE_BYTE_RESPONSE | WRITE_ALL_RESPONSE => {
                let mut f = checked(id, payload)?;
                let operation = if id == WRITE_BYTE_RESPONSE {
                    EepromOperation::WriteByte
                } else {
                    EepromOperation::WriteAll
                };
                Message::Eeprom(EepromResponse {
                    operation,
                    address: None,
                    data: Vec::new(),
                    success: f.u8() == 1,
                })
            }
            READ_ALL_RESPONSE => Message::Eeprom(EepromResponse {
                operation: EepromOperation::ReadAll,
                address: None,
                data: payload.to_vec(),
                success: true,
            }),
            ALIVE => {
                let mut f = checked(id, payload)?;
                Message::Alive {
                    timestamp_ms: f.u16(),
                    counter: f.u16(),
                }
            }
            GEARBOX_STATUS => {
                let mut f = checked(id, payload)?;
                Message::Gearbox {
                    gear: f.u16(),
                    current_torque: f.u16(),
                    max_torque: f.u16(),
                }
            }
            SEAT_HEIGHT_TARGET | SEAT_SLIDE_TARGET | SEAT_INCLINE_TARGET => {
                let axis = SeatAxis::ALL[(id - SEAT_HEIGHT_TARGET) as usize];
                Message::SeatTarget {
                    axis,
                    value: telemetry(axis, id, payload)?,
                }
            }
            SEAT_HEIGHT_CURRENT | SEAT_SLIDE_CURRENT | SEAT_INCLINE_CURRENT => {
                let axis = SeatAxis::ALL[(id - SEAT_HEIGHT_CURRENT) as usize];
                Message::SeatCurrent {
                    axis,
                    value: telemetry(axis, id, payload)?,
                }
            }
            FAULT_1 | FAULT_2 => {
                let mut f = checked(id, payload)?;
                Message::Fault {
                    number: id - FAULT_1 + 1,
                    timestamp_ms: f.u32(),
                }
            }
            LOAD_PROFILE | PROFILE_DATA => {
                let mut f = checked(id, payload)?;
                let profile_id = f.u8();
                let raw = [f.u16(), f.u16(), f.u16()];
                Message::Profile(ProfileData {
                    id: profile_id,
                    position: SeatPosition::from_control_raw(raw),
                    address: None,
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Eeprom(response) => match response.operation {
                EepromOperation::ReadByte => write!(
                    f,
                    "EEPROM_READ_RESPONSE: addr=0x{:X} val=0x{:02X}",
                    response.address.unwrap_or_default(),
                    response.data.first().copied().unwrap_or_default()
                ),
                EepromOperation::WriteByte => write!(
                    f,
                    "EEPROM_WRITE_RESPONSE: {}",
                    status(response.success)
                ),
                EepromOperation::WriteAll => write!(
                    f,
                    "EEPROM_WRITE_ALL_RESPONSE: {}",
                    status(response.success)
                ),
                EepromOperation::ReadAll => {
                    write!(
                        f,
                        "EEPROM_READ_ALL_RESPONSE: {} bytes received",
                        response.data.len()
                    )?;
                    if !response.data.is_empty() {
                        let end = response.data.len().min(HEX_PREVIEW_BYTES);
                        write!(f, ", first {}: {}", end, hex_dump(&response.data[..end]))?;
                    }
                    Ok(())
                }
            },
            Message::Alive {
                timestamp_ms,
                counter,
            } => write!(f, "ALIVE_RECEIVED: ts={} cnt={}", timestamp_ms, counter),
            Message::Gearbox {
                gear,
                current_torque,
                max_torque,
            } => write!(
                f,
                "GEARBOX_RECEIVED: gear={} torque={}/{}",
                gear, current_torque, max_torque
            ),
            Message::SeatTarget { axis, value } => write!(
                f,
                "SEAT_{}_TARGET: {:.1}{}",
                axis.name().to_uppercase(),
                value,
                axis.unit()
            ),
            Message::SeatCurrent { axis, value } => write!(
                f,
                "SEAT_{}_CURRENT: {:.1}{}",
                axis.name().to_uppercase(),
                value,
                axis.unit()
            ),
            Message::Fault {
                number,
                timestamp_ms,
            } => write!(f, "FAULT_{}_STATUS: at {}", number, timestamp_ms),
            Message::Profile(profile) => {
                write!(f, "PROFILE_DATA: id={} {}", profile.id, profile.position)?;
                if let Some(address) = profile.address {
                    write!(f, " addr=0x{:X}", address)?;
                }
                Ok(())
            }
        }
    }
}

fn status(success: bool) -> &'static str {
    if success {
        "SUCCESS"
    } else {
        "FAILED"
    }
}

/// Trace line for a frame whose id has no decoder
pub fn describe_unknown(frame: &Frame) -> String {
    format!(
        "UNKNOWN_RESPONSE: cmdId=0x{:02X} payload={}",
        frame.command_id,
        hex_dump(&frame.payload)
    )
}
