//! Events published by the core to front-ends
//!
//! The core never calls into front-end code. Everything it wants to show is
//! pushed as an [`Event`] onto a bounded channel:
//! - `Trace` - human-readable line (sent command, decoded response, device text)
//! - `Frame` - raw bytes of every validated incoming frame
//! - `Message` - structured decoded message
//! - `ConnectionStatus` - link opened / closed / lost
//!
//! Publishing never blocks. When the consumer falls behind, events are
//! dropped and counted.

use crate::protocol::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Severity of a trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceLevel {
    Info,
    Warn,
    Error,
}

/// Direction of protocol traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,  // ECU -> Host
    Out, // Host -> ECU
}

/// Origin of a trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceKind {
    /// Frame sent or decoded
    Protocol { direction: Direction },
    /// Debug text printed by the firmware
    Device { partial: bool },
    /// Link or session notice
    System,
}

/// Human-readable trace line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub timestamp: String, // HH:MM:SS.mmm
    pub level: TraceLevel,
    pub kind: TraceKind,
    pub text: String,
}

impl Trace {
    /// Current timestamp as HH:MM:SS.mmm
    #[inline]
    fn now() -> String {
        chrono::Local::now().format("%H:%M:%S%.3f").to_string()
    }

    pub fn new(level: TraceLevel, kind: TraceKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: Self::now(),
            level,
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            TraceKind::Protocol {
                direction: Direction::Out,
            } => "TX",
            TraceKind::Protocol {
                direction: Direction::In,
            } => "RX",
            TraceKind::Device { partial: false } => "DEBUG",
            TraceKind::Device { partial: true } => "PARTIAL",
            TraceKind::System => "SYS",
        };
        match self.level {
            TraceLevel::Info => write!(f, "[{}] {:<7} {}", self.timestamp, tag, self.text),
            TraceLevel::Warn => write!(f, "[{}] {:<7} WARN: {}", self.timestamp, tag, self.text),
            TraceLevel::Error => {
                write!(f, "[{}] {:<7} ERROR: {}", self.timestamp, tag, self.text)
            }
        }
    }
}

/// Event delivered to front-ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Trace(Trace),
    Frame { raw: Vec<u8> },
    Message(Message),
    ConnectionStatus { connected: bool, port: String },
}

/// Create an event channel with the given capacity
pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = EventSink {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sink, rx)
}

/// Non-blocking publisher side of the event channel
///
/// Cheap to clone; every clone counts drops into the same counter.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Publish an event (drops it if the channel is full or closed)
    pub fn publish(&self, event: Event) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events lost because the consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn trace(&self, level: TraceLevel, kind: TraceKind, text: impl Into<String>) {
        self.publish(Event::Trace(Trace::new(level, kind, text)));
    }

    /// Trace a frame handed to the link
    pub fn sent(&self, text: impl Into<String>) {
        self.trace(
            TraceLevel::Info,
            TraceKind::Protocol {
                direction: Direction::Out,
            },
            text,
        );
    }

    /// Trace a decoded incoming frame
    pub fn received(&self, text: impl Into<String>) {
        self.trace(
            TraceLevel::Info,
            TraceKind::Protocol {
                direction: Direction::In,
            },
            text,
        );
    }

    /// Trace a line of firmware debug output
    pub fn device_text(&self, text: impl Into<String>, partial: bool) {
        self.trace(TraceLevel::Info, TraceKind::Device { partial }, text);
    }

    pub fn system(&self, text: impl Into<String>) {
        self.trace(TraceLevel::Info, TraceKind::System, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!("{}", text);
        self.trace(TraceLevel::Warn, TraceKind::System, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!("{}", text);
        self.trace(TraceLevel::Error, TraceKind::System, text);
    }

    pub fn frame(&self, raw: &[u8]) {
        self.publish(Event::Frame { raw: raw.to_vec() });
    }

    pub fn message(&self, message: Message) {
        self.publish(Event::Message(message));
    }

    pub fn connection(&self, connected: bool, port: impl Into<String>) {
        self.publish(Event::ConnectionStatus {
            connected,
            port: port.into(),
        });
    }
}
