//! Outgoing commands
//!
//! Each variant carries typed fields; [`Command::encode_payload`] validates
//! them and produces the little-endian payload, so a command that fails
//! validation never reaches the codec.

use super::registry;
use super::units::{SeatAxis, SeatPosition};
use crate::codec::hex_dump;
use crate::constants::MAX_READ_ALL_SIZE;
use crate::error::{Result, SeatLinkError};

/// Fault channel triggered by [`Command::Fault`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultNumber {
    One,
    Two,
}

impl FaultNumber {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for FaultNumber {
    type Error = SeatLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(SeatLinkError::InvalidValue {
                field: "fault",
                reason: format!("fault number {} is not 1 or 2", other),
            }),
        }
    }
}

/// Command sent to the seat controller
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ReadByte {
        address: u32,
    },
    WriteByte {
        address: u32,
        value: u8,
    },
    ReadAll {
        size: u32,
    },
    WriteAll {
        data: Vec<u8>,
    },
    /// Timestamp is truncated to ms mod 65536 on the wire
    Alive {
        timestamp_ms: u64,
        counter: u16,
    },
    GearboxStatus {
        gear: u16,
        current_torque: u16,
        max_torque: u16,
    },
    /// Validated against the calibrated seat bounds
    SeatControlRequest(SeatPosition),
    SeatTarget {
        axis: SeatAxis,
        value: f64,
    },
    SeatCurrent {
        axis: SeatAxis,
        value: f64,
    },
    Fault {
        number: FaultNumber,
        timestamp_ms: u32,
    },
    SaveProfile {
        id: u8,
        position: Option<SeatPosition>,
    },
    LoadProfile {
        id: u8,
    },
    SaveProfileAt {
        address: u16,
        position: SeatPosition,
    },
    LoadProfileAt {
        address: u16,
    },
}

impl Command {
    /// Wire command id
    pub fn id(&self) -> u8 {
        match self {
            Self::ReadByte { .. } => registry::READ_BYTE,
            Self::WriteByte { .. } => registry::WRITE_BYTE,
            Self::ReadAll { .. } => registry::READ_ALL,
            Self::WriteAll { .. } => registry::WRITE_ALL,
            Self::Alive { .. } => registry::ALIVE,
            Self::GearboxStatus { .. } => registry::GEARBOX_STATUS,
            Self::SeatControlRequest(_) => registry::SEAT_CONTROL_REQUEST,
            Self::SeatTarget { axis, .. } => match axis {
                SeatAxis::Height => registry::SEAT_HEIGHT_TARGET,
                SeatAxis::Slide => registry::SEAT_SLIDE_TARGET,
                SeatAxis::Incline => registry::SEAT_INCLINE_TARGET,
            },
            Self::SeatCurrent { axis, .. } => match axis {
                SeatAxis::Height => registry::SEAT_HEIGHT_CURRENT,
                SeatAxis::Slide => registry::SEAT_SLIDE_CURRENT,
                SeatAxis::Incline => registry::SEAT_INCLINE_CURRENT,
            },
            Self::Fault { number, .. } => match number {
                FaultNumber::One => registry::FAULT_1,
                FaultNumber::Two => registry::FAULT_2,
            },
            Self::SaveProfile { .. } => registry::SAVE_PROFILE,
            Self::LoadProfile { .. } => registry::LOAD_PROFILE,
            Self::SaveProfileAt { .. } => registry::SAVE_PROFILE_AT,
            Self::LoadProfileAt { .. } => registry::LOAD_PROFILE_AT,
        }
    }

    /// Validate the fields and build the payload
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Self::ReadByte { address } => out.extend_from_slice(&address.to_le_bytes()),
            Self::WriteByte { address, value } => {
                out.extend_from_slice(&address.to_le_bytes());
                out.push(*value);
            }
            Self::ReadAll { size } => {
                if *size == 0 || *size > MAX_READ_ALL_SIZE {
                    return Err(SeatLinkError::InvalidValue {
                        field: "size",
                        reason: format!("{} outside 1..={}", size, MAX_READ_ALL_SIZE),
                    });
                }
                out.extend_from_slice(&size.to_le_bytes());
            }
            Self::WriteAll { data } => {
                let length = u32::try_from(data.len()).map_err(|_| SeatLinkError::InvalidValue {
                    field: "data",
                    reason: format!("{} bytes exceed a u32 length", data.len()),
                })?;
                out.reserve(4 + data.len());
                out.extend_from_slice(&length.to_le_bytes());
                out.extend_from_slice(data);
            }
            Self::Alive {
                timestamp_ms,
                counter,
            } => {
                out.extend_from_slice(&((timestamp_ms & 0xFFFF) as u16).to_le_bytes());
                out.extend_from_slice(&counter.to_le_bytes());
            }
            Self::GearboxStatus {
                gear,
                current_torque,
                max_torque,
            } => {
                for value in [gear, current_torque, max_torque] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            Self::SeatControlRequest(position) => {
                position.validate()?;
                position.write_control(&mut out)?;
            }
            Self::SeatTarget { axis, value } | Self::SeatCurrent { axis, value } => {
                out.extend_from_slice(&axis.telemetry_bytes(*value)?);
            }
            Self::Fault { timestamp_ms, .. } => out.extend_from_slice(&timestamp_ms.to_le_bytes()),
            Self::SaveProfile { id, position } => {
                out.push(*id);
                if let Some(position) = position {
                    position.write_control(&mut out)?;
                }
            }
            Self::LoadProfile { id } => out.push(*id),
            Self::SaveProfileAt { address, position } => {
                out.extend_from_slice(&address.to_le_bytes());
                position.write_control(&mut out)?;
            }
            Self::LoadProfileAt { address } => out.extend_from_slice(&address.to_le_bytes()),
        }
        Ok(out)
    }

    /// Trace line describing the command
    pub fn describe(&self) -> String {
        match self {
            Self::ReadByte { address } => format!("EEPROM_READ_BYTE: addr=0x{:X}", address),
            Self::WriteByte { address, value } => {
                format!("EEPROM_WRITE_BYTE: addr=0x{:X} val=0x{:02X}", address, value)
            }
            Self::ReadAll { size } => format!("EEPROM_READ_ALL: size={} bytes", size),
            Self::WriteAll { data } => format!("EEPROM_WRITE_ALL: {} bytes", data.len()),
            Self::Alive {
                timestamp_ms,
                counter,
            } => format!("ALIVE: ts={} cnt={}", timestamp_ms & 0xFFFF, counter),
            Self::GearboxStatus {
                gear,
                current_torque,
                max_torque,
            } => format!("GEARBOX: gear={} torque={}/{}", gear, current_torque, max_torque),
            Self::SeatControlRequest(position) => format!("SEAT_CONTROL_REQ: {}", position),
            Self::SeatTarget { axis, value } => format!(
                "SEAT_{}_TARGET: {}{}",
                axis.name().to_uppercase(),
                value,
                axis.unit()
            ),
            Self::SeatCurrent { axis, value } => format!(
                "SEAT_{}_CURRENT: {}{}",
                axis.name().to_uppercase(),
                value,
                axis.unit()
            ),
            Self::Fault {
                number,
                timestamp_ms,
            } => format!("FAULT_{}: triggered at {}", number.as_u8(), timestamp_ms),
            Self::SaveProfile { id, position } => match position {
                Some(position) => format!("PROFILE_SAVE: id={} {}", id, position),
                None => format!("PROFILE_SAVE: id={} (no values provided)", id),
            },
            Self::LoadProfile { id } => format!("PROFILE_LOAD: id={}", id),
            Self::SaveProfileAt { address, position } => {
                format!("PROFILE_SAVE_AT: addr=0x{:X} {}", address, position)
            }
            Self::LoadProfileAt { address } => format!("PROFILE_LOAD_AT: addr=0x{:X}", address),
        }
    }
}

/// Trace line for raw bytes queued without a command
pub fn describe_raw(bytes: &[u8]) -> String {
    format!("RAW_SENT: {}", hex_dump(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alive_payload() {
        let command = Command::Alive {
            timestamp_ms: 0x0001_1234,
            counter: 2,
        };
        assert_eq!(command.id(), 0x10);
        assert_eq!(command.encode_payload().unwrap(), vec![0x34, 0x12, 0x02, 0x00]);
        assert_eq!(command.describe(), "ALIVE: ts=4660 cnt=2");
    }

    #[test]
    fn test_seat_control_request_payload() {
        let command = Command::SeatControlRequest(SeatPosition::new(3.5, 5.0, 85.0));
        let payload = command.encode_payload().unwrap();
        let raw: Vec<u16> = payload
            .chunks(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(raw, vec![350, 500, 8500]);
    }

    #[test]
    fn test_seat_control_request_out_of_range() {
        let command = Command::SeatControlRequest(SeatPosition::new(1.9, 5.0, 85.0));
        assert!(matches!(
            command.encode_payload(),
            Err(SeatLinkError::OutOfRange { field: "height", .. })
        ));
    }

    #[test]
    fn test_eeprom_payloads() {
        let write = Command::WriteByte {
            address: 0x0102,
            value: 0xAB,
        };
        assert_eq!(write.encode_payload().unwrap(), vec![0x02, 0x01, 0, 0, 0xAB]);
        assert_eq!(write.describe(), "EEPROM_WRITE_BYTE: addr=0x102 val=0xAB");

        let write_all = Command::WriteAll {
            data: vec![1, 2, 3],
        };
        assert_eq!(write_all.encode_payload().unwrap(), vec![3, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_read_all_size_bounds() {
        assert!(Command::ReadAll { size: 1 }.encode_payload().is_ok());
        assert!(Command::ReadAll { size: 65536 }.encode_payload().is_ok());
        assert!(Command::ReadAll { size: 0 }.encode_payload().is_err());
        assert!(Command::ReadAll { size: 65537 }.encode_payload().is_err());
    }

    #[test]
    fn test_fault_number() {
        assert_eq!(FaultNumber::try_from(1).unwrap(), FaultNumber::One);
        assert!(FaultNumber::try_from(3).is_err());

        let command = Command::Fault {
            number: FaultNumber::Two,
            timestamp_ms: 0xDEADBEEF,
        };
        assert_eq!(command.id(), 0x51);
        assert_eq!(command.encode_payload().unwrap(), vec![0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_profile_payloads() {
        let bare = Command::SaveProfile { id: 3, position: None };
        assert_eq!(bare.encode_payload().unwrap(), vec![3]);

        let full = Command::SaveProfile {
            id: 3,
            position: Some(SeatPosition::new(3.5, 5.0, 85.0)),
        };
        assert_eq!(
            full.encode_payload().unwrap(),
            vec![3, 0x5E, 0x01, 0xF4, 0x01, 0x34, 0x21]
        );

        let at = Command::LoadProfileAt { address: 0x0120 };
        assert_eq!(at.id(), 0x63);
        assert_eq!(at.encode_payload().unwrap(), vec![0x20, 0x01]);
    }

    #[test]
    fn test_seat_target_uses_telemetry_scale() {
        let height = Command::SeatTarget {
            axis: SeatAxis::Height,
            value: 3.5,
        };
        assert_eq!(height.id(), 0x20);
        assert_eq!(height.encode_payload().unwrap(), vec![35, 0]);

        let incline = Command::SeatCurrent {
            axis: SeatAxis::Incline,
            value: 90.0,
        };
        assert_eq!(incline.id(), 0x32);
        assert_eq!(incline.encode_payload().unwrap(), 1571i16.to_le_bytes().to_vec());
    }

    #[test]
    fn test_payloads_satisfy_registry() {
        let commands = [
            Command::ReadByte { address: 1 },
            Command::WriteByte { address: 1, value: 2 },
            Command::ReadAll { size: 16 },
            Command::WriteAll { data: vec![] },
            Command::Alive {
                timestamp_ms: 0,
                counter: 0,
            },
            Command::GearboxStatus {
                gear: 1,
                current_torque: 2,
                max_torque: 3,
            },
            Command::SeatControlRequest(SeatPosition::new(3.0, 4.0, 90.0)),
            Command::LoadProfile { id: 1 },
            Command::SaveProfileAt {
                address: 0x40,
                position: SeatPosition::new(3.0, 4.0, 90.0),
            },
        ];
        for command in commands {
            let descriptor = registry::lookup(command.id()).expect("registered");
            let payload = command.encode_payload().unwrap();
            assert!(descriptor.check_payload(&payload).is_ok(), "{:?}", command);
        }
    }

    #[test]
    fn test_describe_raw() {
        assert_eq!(describe_raw(&[0x7E, 0x01]), "RAW_SENT: 7E 01");
    }
}
