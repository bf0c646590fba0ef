//! Static command table
//!
//! Every command id the seat controller understands, with its payload layout
//! and the id of the response it triggers. All payload fields are
//! little-endian.
//!
//! The table is the only place that knows how many bytes a payload needs:
//! both the command encoder and the message parser check against it.

use crate::error::{Result, SeatLinkError};

// =============================================================================
// Command ids
// =============================================================================

pub const READ_BYTE: u8 = 0x01;
pub const WRITE_BYTE: u8 = 0x02;
pub const READ_ALL: u8 = 0x03;
pub const WRITE_ALL: u8 = 0x04;

pub const ALIVE: u8 = 0x10;
pub const GEARBOX_STATUS: u8 = 0x11;

pub const SEAT_HEIGHT_TARGET: u8 = 0x20;
pub const SEAT_SLIDE_TARGET: u8 = 0x21;
pub const SEAT_INCLINE_TARGET: u8 = 0x22;

pub const SEAT_HEIGHT_CURRENT: u8 = 0x30;
pub const SEAT_SLIDE_CURRENT: u8 = 0x31;
pub const SEAT_INCLINE_CURRENT: u8 = 0x32;

pub const SEAT_CONTROL_REQUEST: u8 = 0x40;

pub const FAULT_1: u8 = 0x50;
pub const FAULT_2: u8 = 0x51;

pub const SAVE_PROFILE: u8 = 0x60;
pub const LOAD_PROFILE: u8 = 0x61;
pub const SAVE_PROFILE_AT: u8 = 0x62;
pub const LOAD_PROFILE_AT: u8 = 0x63;

/// Requests are answered with `request | RESPONSE_FLAG`
pub const RESPONSE_FLAG: u8 = 0x80;

pub const READ_BYTE_RESPONSE: u8 = READ_BYTE | RESPONSE_FLAG;
pub const WRITE_BYTE_RESPONSE: u8 = WRITE_BYTE | RESPONSE_FLAG;
pub const READ_ALL_RESPONSE: u8 = READ_ALL | RESPONSE_FLAG;
pub const WRITE_ALL_RESPONSE: u8 = WRITE_ALL | RESPONSE_FLAG;
pub const PROFILE_DATA: u8 = LOAD_PROFILE | RESPONSE_FLAG;

// =============================================================================
// Descriptors
// =============================================================================

/// Wire type of a payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    I16,
    U32,
    /// Variable-length tail (consumes the rest of the payload)
    Bytes,
}

impl FieldKind {
    /// Fixed width in bytes (0 for the variable tail)
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 => 4,
            Self::Bytes => 0,
        }
    }
}

/// One payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Physical unit of the raw value, if any
    pub unit: Option<&'static str>,
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        unit: None,
    }
}

const fn scaled(name: &'static str, kind: FieldKind, unit: &'static str) -> Field {
    Field {
        name,
        kind,
        unit: Some(unit),
    }
}

/// Static description of a command id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub id: u8,
    pub name: &'static str,
    pub fields: &'static [Field],
    /// Id of the response this request triggers
    pub response: Option<u8>,
}

impl CommandDescriptor {
    /// Smallest payload that carries every fixed-width field
    pub fn min_payload_len(&self) -> usize {
        self.fields.iter().map(|f| f.kind.width()).sum()
    }

    /// Reject payloads shorter than the fixed fields require
    pub fn check_payload(&self, payload: &[u8]) -> Result<()> {
        let expected = self.min_payload_len();
        if payload.len() < expected {
            return Err(SeatLinkError::MalformedPayload {
                command: self.name,
                expected,
                actual: payload.len(),
            });
        }
        Ok(())
    }
}

use FieldKind::{Bytes, I16, U16, U32, U8};

const SEAT_CONTROL_FIELDS: &[Field] = &[
    scaled("height", U16, "cm*100"),
    scaled("slide", U16, "cm*100"),
    scaled("incline", U16, "deg*100"),
];

const FAULT_FIELDS: &[Field] = &[scaled("timestamp", U32, "ms")];

const PROFILE_DATA_FIELDS: &[Field] = &[
    field("profile_id", U8),
    scaled("height", U16, "cm*100"),
    scaled("slide", U16, "cm*100"),
    scaled("incline", U16, "deg*100"),
];

/// Every known command, ordered by id
pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor {
        id: READ_BYTE,
        name: "EEPROM_READ_BYTE",
        fields: &[field("address", U32)],
        response: Some(READ_BYTE_RESPONSE),
    },
    CommandDescriptor {
        id: WRITE_BYTE,
        name: "EEPROM_WRITE_BYTE",
        fields: &[field("address", U32), field("value", U8)],
        response: Some(WRITE_BYTE_RESPONSE),
    },
    CommandDescriptor {
        id: READ_ALL,
        name: "EEPROM_READ_ALL",
        fields: &[scaled("size", U32, "bytes")],
        response: Some(READ_ALL_RESPONSE),
    },
    CommandDescriptor {
        id: WRITE_ALL,
        name: "EEPROM_WRITE_ALL",
        fields: &[scaled("length", U32, "bytes"), field("data", Bytes)],
        response: Some(WRITE_ALL_RESPONSE),
    },
    CommandDescriptor {
        id: ALIVE,
        name: "ALIVE",
        fields: &[scaled("timestamp", U16, "ms"), field("counter", U16)],
        response: None,
    },
    CommandDescriptor {
        id: GEARBOX_STATUS,
        name: "GEARBOX",
        fields: &[
            field("gear", U16),
            field("current_torque", U16),
            field("max_torque", U16),
        ],
        response: None,
    },
    CommandDescriptor {
        id: SEAT_HEIGHT_TARGET,
        name: "SEAT_HEIGHT_TARGET",
        fields: &[scaled("height", U16, "mm")],
        response: None,
    },
    CommandDescriptor {
        id: SEAT_SLIDE_TARGET,
        name: "SEAT_SLIDE_TARGET",
        fields: &[scaled("slide", U16, "mm")],
        response: None,
    },
    CommandDescriptor {
        id: SEAT_INCLINE_TARGET,
        name: "SEAT_INCLINE_TARGET",
        fields: &[scaled("incline", I16, "mrad")],
        response: None,
    },
    CommandDescriptor {
        id: SEAT_HEIGHT_CURRENT,
        name: "SEAT_HEIGHT_CURRENT",
        fields: &[scaled("height", U16, "mm")],
        response: None,
    },
    CommandDescriptor {
        id: SEAT_SLIDE_CURRENT,
        name: "SEAT_SLIDE_CURRENT",
        fields: &[scaled("slide", U16, "mm")],
        response: None,
    },
    CommandDescriptor {
        id: SEAT_INCLINE_CURRENT,
        name: "SEAT_INCLINE_CURRENT",
        fields: &[scaled("incline", I16, "mrad")],
        response: None,
    },
    CommandDescriptor {
        id: SEAT_CONTROL_REQUEST,
        name: "SEAT_CONTROL_REQ",
        fields: SEAT_CONTROL_FIELDS,
        response: None,
    },
    CommandDescriptor {
        id: FAULT_1,
        name: "FAULT_1",
        fields: FAULT_FIELDS,
        response: None,
    },
    CommandDescriptor {
        id: FAULT_2,
        name: "FAULT_2",
        fields: FAULT_FIELDS,
        response: None,
    },
    CommandDescriptor {
        id: SAVE_PROFILE,
        name: "PROFILE_SAVE",
        // Position values are optional and follow the id
        fields: &[field("profile_id", U8)],
        response: None,
    },
    CommandDescriptor {
        id: LOAD_PROFILE,
        name: "PROFILE_LOAD",
        fields: &[field("profile_id", U8)],
        response: Some(PROFILE_DATA),
    },
    CommandDescriptor {
        id: SAVE_PROFILE_AT,
        name: "PROFILE_SAVE_AT",
        fields: &[
            field("address", U16),
            scaled("height", U16, "cm*100"),
            scaled("slide", U16, "cm*100"),
            scaled("incline", U16, "deg*100"),
        ],
        response: None,
    },
    CommandDescriptor {
        id: LOAD_PROFILE_AT,
        name: "PROFILE_LOAD_AT",
        fields: &[field("address", U16)],
        response: Some(PROFILE_DATA),
    },
    CommandDescriptor {
        id: READ_BYTE_RESPONSE,
        name: "EEPROM_READ_RESPONSE",
        fields: &[field("address", U32), field("value", U8)],
        response: None,
    },
    CommandDescriptor {
        id: WRITE_BYTE_RESPONSE,
        name: "EEPROM_WRITE_RESPONSE",
        fields: &[field("status", U8)],
        response: None,
    },
    CommandDescriptor {
        id: READ_ALL_RESPONSE,
        name: "EEPROM_READ_ALL_RESPONSE",
        fields: &[field("data", Bytes)],
        response: None,
    },
    CommandDescriptor {
        id: WRITE_ALL_RESPONSE,
        name: "EEPROM_WRITE_ALL_RESPONSE",
        fields: &[field("status", U8)],
        response: None,
    },
    CommandDescriptor {
        id: PROFILE_DATA,
        name: "PROFILE_DATA",
        fields: PROFILE_DATA_FIELDS,
        response: None,
    },
];

/// Profile data as sent back under the LOAD_PROFILE id
///
/// Some firmware builds answer a load with `0x61` instead of `0xE1`; the
/// payload layout is the same.
pub static PROFILE_DATA_ECHO: CommandDescriptor = CommandDescriptor {
    id: LOAD_PROFILE,
    name: "PROFILE_DATA",
    fields: PROFILE_DATA_FIELDS,
    response: None,
};

/// Find the descriptor of a command id
pub fn lookup(id: u8) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|d| d.id == id)
}
