//! Frame dispatcher
//!
//! Consumes stream items on the receive thread and turns them into events:
//! - Frames: raw-frame event, then a structured message plus a trace line
//! - Debug text: device trace lines
//! - Rejected frames and resyncs: warning traces, error counter

use super::stats::Stats;
use crate::codec::{Codec, Frame, StreamDecoder, StreamItem};
use crate::events::EventSink;
use crate::protocol::message::describe_unknown;
use crate::protocol::Message;
use crate::transport::ByteSink;
use parking_lot::Mutex;
use std::sync::Arc;

/// Maps decoded frames to events
pub struct Dispatcher {
    events: EventSink,
    stats: Arc<Stats>,
    /// Address of the last address-based profile load, attached to the next
    /// profile data message
    pending_profile_address: Arc<Mutex<Option<u16>>>,
}

impl Dispatcher {
    pub fn new(
        events: EventSink,
        stats: Arc<Stats>,
        pending_profile_address: Arc<Mutex<Option<u16>>>,
    ) -> Self {
        Self {
            events,
            stats,
            pending_profile_address,
        }
    }

    pub fn handle_item(&self, item: StreamItem) {
        match item {
            StreamItem::Frame { frame, raw } => self.handle_frame(&frame, &raw),
            StreamItem::Text { line, partial } => self.events.device_text(line, partial),
            StreamItem::Rejected { error, skipped } => {
                self.stats.record_error();
                self.events
                    .warn(format!("{} (dropped {} bytes)", error, skipped));
            }
            StreamItem::Resync { discarded } => {
                self.events.warn(format!(
                    "Resync: skipped {} bytes before next frame header",
                    discarded
                ));
            }
        }
    }

    pub fn handle_frame(&self, frame: &Frame, raw: &[u8]) {
        self.events.frame(raw);

        match Message::parse(frame) {
            Ok(Some(mut message)) => {
                if let Message::Profile(profile) = &mut message {
                    profile.address = self.pending_profile_address.lock().take();
                }
                self.events.received(message.to_string());
                self.events.message(message);
            }
            Ok(None) => self.events.received(describe_unknown(frame)),
            Err(e) => {
                self.stats.record_error();
                self.events.warn(e.to_string());
            }
        }
    }
}

/// Receive-side pipeline owned by the reader thread
///
/// Holds the accumulation buffer, so a fresh one is built on every connect.
pub struct ReceivePath {
    decoder: StreamDecoder<Box<dyn Codec>>,
    dispatcher: Dispatcher,
}

impl ReceivePath {
    pub fn new(codec: Box<dyn Codec>, text_flush_threshold: usize, dispatcher: Dispatcher) -> Self {
        Self {
            decoder: StreamDecoder::new(codec, text_flush_threshold),
            dispatcher,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        let dispatcher = &self.dispatcher;
        self.decoder.feed(chunk, |item| dispatcher.handle_item(item));
    }

    pub fn into_sink(mut self) -> ByteSink {
        Box::new(move |chunk: &[u8]| self.feed(chunk))
    }
}
