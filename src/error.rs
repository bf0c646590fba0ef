//! Centralized error types for the seat link
//!
//! All errors are represented by the `SeatLinkError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, SeatLinkError>`.

use std::fmt;
use std::path::PathBuf;

/// All seat link errors
#[derive(Debug)]
pub enum SeatLinkError {
    // === Connection ===
    /// Named serial port does not exist
    PortNotFound { port: String },
    /// The OS refused to open the port
    OpenFailed {
        port: String,
        source: std::io::Error,
    },
    /// Write to the port failed or was short
    WriteFailed { written: usize, expected: usize },
    /// Read from the port failed
    ReadFailed { source: std::io::Error },
    /// Port vanished while the link was open
    PortClosedUnexpectedly { reason: String },
    /// Send attempted while no link is open
    NotConnected,

    // === Protocol ===
    /// Frame did not start with the header byte
    MissingHeader { found: u8 },
    /// Tail byte mismatch after consuming the declared length
    BadTail { found: u8 },
    /// Received checksum differs from the recomputed one
    ChecksumMismatch { expected: u8, found: u8 },
    /// Declared length is zero or exceeds the configured maximum
    BadLength { length: usize, max: usize },
    /// Payload shorter than the command descriptor requires
    MalformedPayload {
        command: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Payload cannot be expressed by the selected codec profile
    UnsupportedByProfile { profile: &'static str, reason: String },

    // === Validation ===
    /// Seat target outside its calibrated bounds
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Argument outside its accepted domain
    InvalidValue { field: &'static str, reason: String },

    // === Config ===
    /// Config file could not be read or written
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },
}

impl std::error::Error for SeatLinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OpenFailed { source, .. }
            | Self::ReadFailed { source }
            | Self::ConfigRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for SeatLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortNotFound { port } => write!(f, "Port {} not found", port),
            Self::OpenFailed { port, source } => {
                write!(f, "Failed to open port {}: {}", port, source)
            }
            Self::WriteFailed { written, expected } => {
                write!(f, "Incomplete write: {}/{} bytes", written, expected)
            }
            Self::ReadFailed { source } => write!(f, "Read error: {}", source),
            Self::PortClosedUnexpectedly { reason } => {
                write!(f, "Port closed unexpectedly: {}", reason)
            }
            Self::NotConnected => write!(f, "Cannot send - not connected"),
            Self::MissingHeader { found } => {
                write!(f, "Expected frame header, found 0x{:02X}", found)
            }
            Self::BadTail { found } => write!(f, "Invalid frame tail: 0x{:02X}", found),
            Self::ChecksumMismatch { expected, found } => write!(
                f,
                "Checksum mismatch: expected 0x{:02X}, found 0x{:02X}",
                expected, found
            ),
            Self::BadLength { length, max } => {
                write!(f, "Frame length {} outside 1..={}", length, max)
            }
            Self::MalformedPayload {
                command,
                expected,
                actual,
            } => write!(
                f,
                "Malformed {} payload: need {} bytes, got {}",
                command, expected, actual
            ),
            Self::UnsupportedByProfile { profile, reason } => {
                write!(f, "Not supported by {} framing: {}", profile, reason)
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{} {} outside [{}, {}]", field, value, min, max),
            Self::InvalidValue { field, reason } => write!(f, "Invalid {}: {}", field, reason),
            Self::ConfigRead { path, .. } => write!(f, "Cannot access config: {}", path.display()),
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
        }
    }
}

/// Alias for Result with SeatLinkError
pub type Result<T> = std::result::Result<T, SeatLinkError>;
