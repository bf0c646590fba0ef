//! Configuration management
//!
//! Settings live in a TOML file (`seat-link.toml` by default). Every section
//! is `#[serde(default)]`, so partial files only override what they name.

use crate::codec::{Codec, CodecProfile, LegacyCodec, StandardCodec};
use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_DISCONNECT_TIMEOUT_MS, DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_PAYLOAD,
    DEFAULT_READ_CHUNK_SIZE, DEFAULT_READ_TIMEOUT_MS, DEFAULT_TEXT_FLUSH_THRESHOLD,
    DEFAULT_WRITE_TIMEOUT_MS, MAX_READ_CHUNK_SIZE, MIN_READ_CHUNK_SIZE,
};
use crate::error::{Result, SeatLinkError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default config file name, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "seat-link.toml";

// =============================================================================
// Application Configuration
// =============================================================================

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub link: LinkConfig,
    pub protocol: ProtocolConfig,
    pub events: EventsConfig,
}

// =============================================================================
// Link Configuration
// =============================================================================

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial port name (empty = must be given on the command line)
    pub port: String,
    pub baud_rate: u32,
    /// 5..=8
    pub data_bits: u8,
    /// 1 or 2
    pub stop_bits: u8,
    pub parity: Parity,
    /// Max bytes per read, clamped to [64, 65536]
    pub read_chunk_size: usize,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Bounded wait for the I/O threads on disconnect
    pub disconnect_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            disconnect_timeout_ms: DEFAULT_DISCONNECT_TIMEOUT_MS,
        }
    }
}

impl LinkConfig {
    /// Settings for a port with everything else at defaults
    pub fn for_port(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Self::default()
        }
    }

    /// Read chunk size clamped to the supported range
    pub fn chunk_size(&self) -> usize {
        self.read_chunk_size
            .clamp(MIN_READ_CHUNK_SIZE, MAX_READ_CHUNK_SIZE)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}

// =============================================================================
// Protocol Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Framing profile: "standard" or "legacy"
    pub profile: CodecProfile,
    /// Reject frames whose XOR checksum does not match
    pub verify_checksum: bool,
    /// Unterminated debug text is flushed past this many bytes
    pub text_flush_threshold: usize,
    /// Largest accepted payload
    pub max_payload: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            profile: CodecProfile::Standard,
            verify_checksum: true,
            text_flush_threshold: DEFAULT_TEXT_FLUSH_THRESHOLD,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ProtocolConfig {
    /// Build the codec for the selected profile
    pub fn codec(&self) -> Box<dyn Codec> {
        match self.profile {
            CodecProfile::Standard => {
                Box::new(StandardCodec::new(self.verify_checksum, self.max_payload))
            }
            CodecProfile::Legacy => Box::new(LegacyCodec),
        }
    }
}

// =============================================================================
// Events Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Event channel capacity (events beyond this are dropped and counted)
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

fn invalid(field: &'static str, reason: impl Into<String>) -> SeatLinkError {
    SeatLinkError::ConfigValidation {
        field,
        reason: reason.into(),
    }
}

impl Config {
    /// Reject values the link or codec cannot work with
    pub fn validate(&self) -> Result<()> {
        let link = &self.link;
        if link.baud_rate == 0 {
            return Err(invalid("link.baud_rate", "must be greater than 0"));
        }
        if !(5..=8).contains(&link.data_bits) {
            return Err(invalid(
                "link.data_bits",
                format!("{} not in 5..=8", link.data_bits),
            ));
        }
        if !matches!(link.stop_bits, 1 | 2) {
            return Err(invalid(
                "link.stop_bits",
                format!("{} is not 1 or 2", link.stop_bits),
            ));
        }
        if link.read_timeout_ms == 0 {
            return Err(invalid("link.read_timeout_ms", "must be greater than 0"));
        }
        if self.protocol.text_flush_threshold == 0 {
            return Err(invalid(
                "protocol.text_flush_threshold",
                "must be greater than 0",
            ));
        }
        if self.protocol.max_payload == 0 || self.protocol.max_payload >= u32::MAX as usize {
            return Err(invalid(
                "protocol.max_payload",
                format!("{} outside 1..{}", self.protocol.max_payload, u32::MAX),
            ));
        }
        if self.events.capacity == 0 {
            return Err(invalid("events.capacity", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Load config from a file
///
/// A missing file yields the defaults. Unreadable or invalid files are errors.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|e| SeatLinkError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| SeatLinkError::ConfigValidation {
        field: "config",
        reason: format!("{}: {}", path.display(), e),
    })?;

    config.validate()?;
    Ok(config)
}

/// Save config to a file
pub fn save(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).map_err(|e| SeatLinkError::ConfigValidation {
        field: "config",
        reason: e.to_string(),
    })?;
    fs::write(path, content).map_err(|e| SeatLinkError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })
}

// ============================================================================
// Tests
// ============================================================================
