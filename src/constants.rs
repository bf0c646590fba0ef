//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Framing
// =============================================================================

/// First byte of every binary frame
pub const FRAME_HEADER: u8 = 0x7E;

/// Last byte of every binary frame
pub const FRAME_TAIL: u8 = 0x7F;

/// Header + length + command id + checksum + tail (empty payload)
pub const MIN_FRAME_SIZE: usize = 8;

/// Bytes preceding the command id (header + 4-byte length)
pub const FRAME_PREFIX_SIZE: usize = 5;

/// Fixed size of a legacy EEPROM programmer frame
pub const LEGACY_FRAME_SIZE: usize = 12;

/// Largest payload accepted on decode before the frame is treated as garbage
pub const DEFAULT_MAX_PAYLOAD: usize = 128 * 1024;

/// Unterminated debug text is flushed as a partial line past this size
pub const DEFAULT_TEXT_FLUSH_THRESHOLD: usize = 500;

/// Number of payload bytes previewed in READ_ALL traces
pub const HEX_PREVIEW_BYTES: usize = 16;

// =============================================================================
// Serial
// =============================================================================

/// Default baud rate of the seat controller UART
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read chunk size for the receive thread
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Lower bound of the configurable read chunk
pub const MIN_READ_CHUNK_SIZE: usize = 64;

/// Upper bound of the configurable read chunk
pub const MAX_READ_CHUNK_SIZE: usize = 65536;

/// Serial read timeout (milliseconds)
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Serial write timeout (milliseconds)
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 100;

/// Bounded wait for the sender thread on disconnect (milliseconds)
pub const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 1000;

/// Consecutive failed or empty reads before assuming the port is gone
pub const SERIAL_DISCONNECT_THRESHOLD: u32 = 10;

// =============================================================================
// Events
// =============================================================================

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

// =============================================================================
// EEPROM
// =============================================================================

/// Largest READ_ALL request the controller accepts
pub const MAX_READ_ALL_SIZE: u32 = 65536;

// =============================================================================
// Seat calibration (control scale)
// =============================================================================

/// Seat height bounds in centimetres
pub const SEAT_HEIGHT_RANGE_CM: (f64, f64) = (2.0, 5.3);

/// Seat slide bounds in centimetres
pub const SEAT_SLIDE_RANGE_CM: (f64, f64) = (3.0, 7.5);

/// Seat incline bounds in degrees
pub const SEAT_INCLINE_RANGE_DEG: (f64, f64) = (67.0, 105.0);
