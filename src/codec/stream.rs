//! Stream decoder for distinguishing binary frames from debug text
//!
//! The ECU sends two kinds of data on the same UART:
//! - Binary frames starting with the header byte (0x7E)
//! - Debug text terminated by '\n' (printf output from the firmware)
//!
//! Discrimination happens per chunk: a chunk that arrives while no frame is
//! pending and does not start with the header byte is text. Binary bytes are
//! accumulated until the codec reports a complete frame. Rejected frames are
//! dropped as a whole and decoding resumes at the next header byte.

use super::{Codec, Frame};
use crate::constants::FRAME_HEADER;
use crate::error::SeatLinkError;
use bytes::{Buf, Bytes, BytesMut};

/// Item produced by the stream decoder
#[derive(Debug)]
pub enum StreamItem {
    /// Complete, validated frame
    Frame {
        frame: Frame,
        /// Exact wire bytes of the frame
        raw: Bytes,
    },
    /// Line of debug text (or an unterminated fragment flushed early)
    Text { line: String, partial: bool },
    /// Frame rejected by the codec; `skipped` bytes were discarded
    Rejected {
        error: SeatLinkError,
        skipped: usize,
    },
    /// Bytes skipped while searching for the next header
    Resync { discarded: usize },
}

/// Accumulating decoder over an arbitrary chunked byte stream
pub struct StreamDecoder<C: Codec> {
    codec: C,
    binary: BytesMut,
    text: Vec<u8>,
    /// Unterminated text is flushed once it grows past this size
    text_flush_threshold: usize,
}

impl<C: Codec> StreamDecoder<C> {
    pub fn new(codec: C, text_flush_threshold: usize) -> Self {
        Self {
            codec,
            binary: BytesMut::with_capacity(1024),
            text: Vec::with_capacity(256),
            text_flush_threshold,
        }
    }

    /// Feed a chunk and emit every item it completes
    pub fn feed(&mut self, chunk: &[u8], mut on_item: impl FnMut(StreamItem)) {
        if chunk.is_empty() {
            return;
        }

        if self.binary.is_empty() && chunk[0] != FRAME_HEADER {
            self.push_text(chunk, &mut on_item);
            return;
        }

        self.binary.extend_from_slice(chunk);
        self.drain_frames(&mut on_item);
    }

    fn drain_frames(&mut self, on_item: &mut impl FnMut(StreamItem)) {
        while !self.binary.is_empty() {
            if self.binary[0] != FRAME_HEADER {
                match self.binary.iter().position(|&b| b == FRAME_HEADER) {
                    Some(pos) => {
                        self.binary.advance(pos);
                        on_item(StreamItem::Resync { discarded: pos });
                    }
                    None => {
                        // Trailing bytes after the last frame are text
                        let rest = self.binary.split().freeze();
                        self.push_text(&rest, on_item);
                    }
                }
                continue;
            }

            match self.codec.try_decode_one(&self.binary) {
                Ok(Some((frame, consumed))) => {
                    let raw = self.binary.split_to(consumed).freeze();
                    on_item(StreamItem::Frame { frame, raw });
                }
                Ok(None) => break,
                Err(error) => {
                    let skipped = match error {
                        SeatLinkError::BadTail { .. } | SeatLinkError::ChecksumMismatch { .. } => {
                            self.codec.declared_len(&self.binary).unwrap_or(1)
                        }
                        _ => 1,
                    }
                    .clamp(1, self.binary.len());
                    self.binary.advance(skipped);
                    on_item(StreamItem::Rejected { error, skipped });
                }
            }
        }
    }

    fn push_text(&mut self, data: &[u8], on_item: &mut impl FnMut(StreamItem)) {
        self.text.extend_from_slice(data);

        while let Some(pos) = self.text.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.text.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]).trim().to_string();
            if !line.is_empty() {
                on_item(StreamItem::Text {
                    line,
                    partial: false,
                });
            }
        }

        if self.text.len() > self.text_flush_threshold {
            let line = String::from_utf8_lossy(&self.text).into_owned();
            self.text.clear();
            on_item(StreamItem::Text {
                line,
                partial: true,
            });
        }
    }

    /// Unterminated debug text waiting for a newline
    pub fn pending_text(&self) -> &[u8] {
        &self.text
    }

    /// Bytes of an incomplete frame waiting for more data
    pub fn pending_binary(&self) -> usize {
        self.binary.len()
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.binary.clear();
        self.text.clear();
    }
}
