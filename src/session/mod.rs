//! Seat controller session
//!
//! The session ties the pieces together:
//! - Command encoding (validation, codec profile)
//! - The link (one open port, background I/O threads)
//! - The receive path (stream decoder + dispatcher, rebuilt per connect)
//! - Statistics and the event channel
//!
//! The session does NOT handle:
//! - Presentation of events (front-ends consume the event channel)
//! - Periodic sending (callers decide when to send alive/telemetry frames)

pub mod dispatcher;
pub mod stats;

pub use dispatcher::{Dispatcher, ReceivePath};
pub use stats::{Stats, StatsSnapshot};

use crate::codec::Codec;
use crate::config::{Config, LinkConfig};
use crate::constants::MIN_FRAME_SIZE;
use crate::error::{Result, SeatLinkError};
use crate::events::{self, Event, EventSink};
use crate::protocol::command::describe_raw;
use crate::protocol::{Command, FaultNumber, SeatAxis, SeatPosition};
use crate::transport::{ConnectionState, Connector, Link, SerialConnector};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Seat controller session
///
/// Every command method validates and encodes first, so a rejected command
/// never touches the link. Responses arrive asynchronously on the event
/// channel returned by [`Session::new`].
///
/// # Example
///
/// ```ignore
/// let (session, mut events) = Session::new(Config::default());
/// session.connect_to("/dev/ttyUSB0", 115_200)?;
/// session.read_byte(0x10)?;
/// while let Some(event) = events.recv().await { /* ... */ }
/// ```
pub struct Session {
    config: Config,
    link: Link,
    stats: Arc<Stats>,
    events: EventSink,
    codec: Box<dyn Codec>,
    pending_profile_address: Arc<Mutex<Option<u16>>>,
}

impl Session {
    /// Create a session using the OS serial ports
    pub fn new(config: Config) -> (Self, mpsc::Receiver<Event>) {
        Self::with_connector(config, Arc::new(SerialConnector))
    }

    /// Create a session with a custom port opener
    pub fn with_connector(
        config: Config,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (events, rx) = events::channel(config.events.capacity);
        let stats = Arc::new(Stats::new());
        let link = Link::new(connector, stats.clone(), events.clone());
        let codec = config.protocol.codec();
        let session = Self {
            config,
            link,
            stats,
            events,
            codec,
            pending_profile_address: Arc::new(Mutex::new(None)),
        };
        (session, rx)
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect with the configured link settings
    pub fn connect(&self) -> Result<()> {
        let settings = self.config.link.clone();
        self.connect_with(&settings)
    }

    /// Connect to `port` at `baud_rate`, other settings from the config
    pub fn connect_to(&self, port: &str, baud_rate: u32) -> Result<()> {
        let settings = LinkConfig {
            port: port.to_string(),
            baud_rate,
            ..self.config.link.clone()
        };
        self.connect_with(&settings)
    }

    /// Connect with explicit link settings
    ///
    /// A previously open link is closed first. The receive buffer starts
    /// empty on every connect.
    pub fn connect_with(&self, settings: &LinkConfig) -> Result<()> {
        self.pending_profile_address.lock().take();
        let dispatcher = Dispatcher::new(
            self.events.clone(),
            self.stats.clone(),
            self.pending_profile_address.clone(),
        );
        let receive = ReceivePath::new(
            self.config.protocol.codec(),
            self.config.protocol.text_flush_threshold,
            dispatcher,
        );
        debug!(
            "Connecting to {} with {} framing",
            settings.port,
            self.codec.name()
        );
        self.link.connect(settings, receive.into_sink())
    }

    /// Close the link (idempotent, bounded wait)
    pub fn disconnect(&self) {
        self.link.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn port(&self) -> Option<String> {
        self.link.port()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Events lost because the consumer fell behind
    pub fn events_dropped(&self) -> u64 {
        self.events.dropped()
    }

    /// Buffers waiting to be written
    pub fn queue_depth(&self) -> usize {
        self.link.queue_depth()
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Validate and frame a command with the active codec profile
    pub fn encode(&self, command: &Command) -> Result<Vec<u8>> {
        let payload = command.encode_payload()?;
        let mut out = Vec::with_capacity(payload.len() + MIN_FRAME_SIZE);
        self.codec.encode(command.id(), &payload, &mut out)?;
        Ok(out)
    }

    /// Encode, queue and trace one command
    pub fn send_command(&self, command: &Command) -> Result<()> {
        let bytes = self.encode(command)?;
        self.link.send(Bytes::from(bytes))?;
        self.events.sent(command.describe());
        Ok(())
    }

    pub fn send_alive(&self, timestamp_ms: u64, counter: u16) -> Result<()> {
        self.send_command(&Command::Alive {
            timestamp_ms,
            counter,
        })
    }

    pub fn send_gearbox_status(&self, gear: u16, current_torque: u16, max_torque: u16) -> Result<()> {
        self.send_command(&Command::GearboxStatus {
            gear,
            current_torque,
            max_torque,
        })
    }

    /// Request a seat position (rejected with `OutOfRange` outside the calibrated bounds)
    pub fn send_seat_control_request(
        &self,
        height_cm: f64,
        slide_cm: f64,
        incline_deg: f64,
    ) -> Result<()> {
        self.send_command(&Command::SeatControlRequest(SeatPosition::new(
            height_cm,
            slide_cm,
            incline_deg,
        )))
    }

    /// Send one telemetry-scale target value
    pub fn send_seat_target(&self, axis: SeatAxis, value: f64) -> Result<()> {
        self.send_command(&Command::SeatTarget { axis, value })
    }

    /// Send the current position as three telemetry frames
    ///
    /// All three are encoded first and queued together, so neither an
    /// unencodable value nor a closed link sends a partial set.
    pub fn send_seat_current_position(
        &self,
        height_cm: f64,
        slide_cm: f64,
        incline_deg: f64,
    ) -> Result<()> {
        let commands = [
            Command::SeatCurrent {
                axis: SeatAxis::Height,
                value: height_cm,
            },
            Command::SeatCurrent {
                axis: SeatAxis::Slide,
                value: slide_cm,
            },
            Command::SeatCurrent {
                axis: SeatAxis::Incline,
                value: incline_deg,
            },
        ];
        let frames = commands
            .iter()
            .map(|command| self.encode(command).map(Bytes::from))
            .collect::<Result<Vec<_>>>()?;

        self.link.send_all(frames)?;
        for command in &commands {
            self.events.sent(command.describe());
        }
        Ok(())
    }

    /// Trigger fault 1 or 2, stamped with the current time
    pub fn send_fault(&self, number: u8) -> Result<()> {
        let number = FaultNumber::try_from(number)?;
        // Wall-clock milliseconds, truncated to the 32-bit wire field
        let timestamp_ms = chrono::Utc::now().timestamp_millis() as u32;
        self.send_command(&Command::Fault {
            number,
            timestamp_ms,
        })
    }

    pub fn read_byte(&self, address: u32) -> Result<()> {
        self.send_command(&Command::ReadByte { address })
    }

    /// Write one EEPROM byte (`value` must fit in 0..=255)
    pub fn write_byte(&self, address: u32, value: i32) -> Result<()> {
        let value = u8::try_from(value).map_err(|_| SeatLinkError::InvalidValue {
            field: "value",
            reason: format!("{} outside 0..=255", value),
        })?;
        self.send_command(&Command::WriteByte { address, value })
    }

    /// Request `size` bytes of EEPROM (1..=65536)
    pub fn read_all(&self, size: u32) -> Result<()> {
        self.send_command(&Command::ReadAll { size })
    }

    pub fn write_all(&self, data: &[u8]) -> Result<()> {
        self.send_command(&Command::WriteAll {
            data: data.to_vec(),
        })
    }

    /// Save a profile slot, optionally with explicit control-scale values
    pub fn save_profile(&self, id: u8, position: Option<SeatPosition>) -> Result<()> {
        self.send_command(&Command::SaveProfile { id, position })
    }

    pub fn load_profile(&self, id: u8) -> Result<()> {
        self.pending_profile_address.lock().take();
        self.send_command(&Command::LoadProfile { id })
    }

    pub fn save_profile_at(&self, address: u16, position: SeatPosition) -> Result<()> {
        self.send_command(&Command::SaveProfileAt { address, position })
    }

    /// Load a profile by EEPROM address
    ///
    /// The next profile data message is tagged with `address`.
    pub fn load_profile_at(&self, address: u16) -> Result<()> {
        *self.pending_profile_address.lock() = Some(address);
        let result = self.send_command(&Command::LoadProfileAt { address });
        if result.is_err() {
            self.pending_profile_address.lock().take();
        }
        result
    }

    /// Queue bytes as-is, without framing
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.link.send(Bytes::copy_from_slice(bytes))?;
        self.events.sent(describe_raw(bytes));
        Ok(())
    }

    /// Queue raw bytes given as hex (`"7E 00 00"`; whitespace is ignored)
    pub fn send_hex(&self, text: &str) -> Result<()> {
        let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() {
            return Err(SeatLinkError::InvalidValue {
                field: "hex",
                reason: "no bytes given".into(),
            });
        }
        let bytes = hex::decode(&digits).map_err(|e| SeatLinkError::InvalidValue {
            field: "hex",
            reason: e.to_string(),
        })?;
        self.send_raw(&bytes)
    }

    /// Queue a text line for the firmware console (`\n` appended)
    pub fn send_line(&self, text: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\n');
        self.link.send(Bytes::from(bytes))?;
        self.events.sent(format!("LINE_SENT: {}", text));
        Ok(())
    }
}
