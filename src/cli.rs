//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help generation.

use clap::{Parser, Subcommand};
use seat_link::codec::CodecProfile;
use seat_link::config::{Config, DEFAULT_CONFIG_FILE};
use seat_link::protocol::SeatAxis;
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Serial console for the seat controller ECU
#[derive(Parser, Debug)]
#[command(name = "seat-link")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output (also prints raw frames)
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Serial port to use (overrides config)
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// Baud rate (overrides config)
    #[arg(long, value_name = "N")]
    pub baud: Option<u32>,

    /// Use the fixed 12-byte EEPROM programmer framing
    #[arg(long)]
    pub legacy: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Stop after this many milliseconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "MS")]
    pub wait: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Command sent once after connecting
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List serial ports and exit
    Ports,

    /// Print incoming traffic until Ctrl-C (default)
    Monitor,

    /// Send an alive frame
    Alive {
        /// Timestamp in ms (default: now)
        #[arg(long)]
        timestamp: Option<u64>,
        #[arg(long, default_value_t = 0)]
        counter: u16,
    },

    /// Send a gearbox status frame
    Gearbox {
        gear: u16,
        current_torque: u16,
        max_torque: u16,
    },

    /// Request a seat position (height cm, slide cm, incline deg)
    Seat {
        height: f64,
        slide: f64,
        incline: f64,
    },

    /// Send one seat target (height | slide | incline)
    Target { axis: SeatAxis, value: f64 },

    /// Send the current seat position as telemetry
    Current {
        height: f64,
        slide: f64,
        incline: f64,
    },

    /// Trigger fault 1 or 2
    Fault { number: u8 },

    /// Read one EEPROM byte
    ReadByte {
        #[arg(value_parser = parse_u32)]
        address: u32,
    },

    /// Write one EEPROM byte
    WriteByte {
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },

    /// Dump EEPROM contents
    ReadAll {
        #[arg(value_parser = parse_u32)]
        size: u32,
    },

    /// Write EEPROM contents given as hex
    WriteAll {
        #[arg(required = true, num_args = 1..)]
        hex: Vec<String>,
    },

    /// Save a profile (by id, or by EEPROM address with --address)
    SaveProfile {
        id: u8,
        #[arg(long, value_parser = parse_u16)]
        address: Option<u16>,
        #[arg(long)]
        height: Option<f64>,
        #[arg(long)]
        slide: Option<f64>,
        #[arg(long)]
        incline: Option<f64>,
    },

    /// Load a profile (by id, or by EEPROM address with --address)
    LoadProfile {
        #[arg(required_unless_present = "address")]
        id: Option<u8>,
        #[arg(long, value_parser = parse_u16)]
        address: Option<u16>,
    },

    /// Send raw bytes given as hex
    Raw {
        #[arg(required = true, num_args = 1..)]
        hex: Vec<String>,
    },

    /// Send a text line to the firmware console
    Line { text: String },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = &self.port {
            config.link.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.link.baud_rate = baud;
        }
        if self.legacy {
            config.protocol.profile = CodecProfile::Legacy;
        }
    }
}

/// Parse `0x1F` or `31`
fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_u32(s)?;
    u16::try_from(value).map_err(|_| format!("{} does not fit in 16 bits", s))
}

// =============================================================================
// Tests
// =============================================================================
