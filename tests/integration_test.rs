//! Integration tests for the seat controller session
//!
//! Drives a complete `Session` (link threads, codec, dispatcher, events)
//! through an in-memory mock port.

use parking_lot::Mutex;
use seat_link::codec::standard::encode;
use seat_link::codec::CodecProfile;
use seat_link::config::{Config, LinkConfig};
use seat_link::events::{Direction, Event, TraceKind};
use seat_link::protocol::{EepromOperation, Message, SeatAxis};
use seat_link::transport::{ConnectionState, Connector, PortPair};
use seat_link::{Result, SeatLinkError, Session};
use std::io::{self, ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc as tokio_mpsc;

// =============================================================================
// Mock Port
// =============================================================================

/// Read half fed by the test; dropping the feeder looks like an unplugged cable
struct MockReader(Receiver<Vec<u8>>);

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.recv_timeout(Duration::from_millis(10)) {
            Ok(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Err(RecvTimeoutError::Timeout) => Err(io::Error::new(ErrorKind::TimedOut, "timeout")),
            Err(RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
            }
        }
    }
}

/// Write half capturing everything the session sends
#[derive(Clone, Default)]
struct MockWriter(Arc<Mutex<Vec<u8>>>);

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Connector handing out a fresh mock port on every open
#[derive(Clone, Default)]
struct MockConnector {
    feeder: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    written: MockWriter,
}

impl MockConnector {
    /// Push bytes as if the ECU sent them
    fn inject(&self, bytes: &[u8]) {
        if let Some(feeder) = self.feeder.lock().as_ref() {
            feeder.send(bytes.to_vec()).unwrap();
        }
    }

    fn unplug(&self) {
        self.feeder.lock().take();
    }

    fn written(&self) -> Vec<u8> {
        self.written.0.lock().clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, settings: &LinkConfig) -> Result<PortPair> {
        if settings.port != "MOCK" {
            return Err(SeatLinkError::PortNotFound {
                port: settings.port.clone(),
            });
        }
        let (tx, rx) = mpsc::channel();
        *self.feeder.lock() = Some(tx);
        Ok(PortPair {
            reader: Box::new(MockReader(rx)),
            writer: Box::new(self.written.clone()),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn connected_session() -> (Session, tokio_mpsc::Receiver<Event>, MockConnector) {
    connected_session_with(Config::default())
}

fn connected_session_with(
    config: Config,
) -> (Session, tokio_mpsc::Receiver<Event>, MockConnector) {
    let mock = MockConnector::default();
    let (session, events) = Session::with_connector(config, Arc::new(mock.clone()));
    session.connect_to("MOCK", 115_200).unwrap();
    (session, events, mock)
}

/// Wait for the first event matching `predicate`
async fn expect_event(
    events: &mut tokio_mpsc::Receiver<Event>,
    mut predicate: impl FnMut(&Event) -> bool,
) -> Event {
    let deadline = Duration::from_secs(2);
    tokio::time::timeout(deadline, async {
        loop {
            match events.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("Event channel closed"),
            }
        }
    })
    .await
    .expect("Timed out waiting for event")
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_connect_emits_status() {
    let (session, mut events, _mock) = connected_session();
    assert!(session.is_connected());
    assert_eq!(session.port().as_deref(), Some("MOCK"));

    let event = expect_event(&mut events, |e| matches!(e, Event::ConnectionStatus { .. })).await;
    assert_eq!(
        event,
        Event::ConnectionStatus {
            connected: true,
            port: "MOCK".into()
        }
    );
    session.disconnect();
}

#[tokio::test]
async fn test_alive_bytes_on_the_wire() {
    let (session, mut events, mock) = connected_session();
    session.send_alive(0x1234, 2).unwrap();

    let expected = vec![
        0x7E, 0x00, 0x00, 0x00, 0x05, 0x10, 0x34, 0x12, 0x02, 0x00, 0x34, 0x7F,
    ];
    assert!(wait_until(|| mock.written().len() == expected.len()));
    assert_eq!(mock.written(), expected);

    let event = expect_event(&mut events, |e| {
        matches!(e, Event::Trace(t) if t.text.starts_with("ALIVE"))
    })
    .await;
    match event {
        Event::Trace(trace) => assert_eq!(trace.text, "ALIVE: ts=4660 cnt=2"),
        other => panic!("Expected Trace, got {:?}", other),
    }
    session.disconnect();
}

#[tokio::test]
async fn test_eeprom_read_response_roundtrip() {
    let (session, mut events, mock) = connected_session();
    session.read_byte(0x10).unwrap();
    assert!(wait_until(|| !mock.written().is_empty()));

    // ECU answers in two chunks
    let reply = encode(0x81, &[0x10, 0x00, 0x00, 0x00, 0xAA]);
    mock.inject(&reply[..4]);
    mock.inject(&reply[4..]);

    let event = expect_event(&mut events, |e| matches!(e, Event::Message(_))).await;
    match event {
        Event::Message(Message::Eeprom(response)) => {
            assert_eq!(response.operation, EepromOperation::ReadByte);
            assert_eq!(response.address, Some(0x10));
            assert_eq!(response.data, vec![0xAA]);
        }
        other => panic!("Expected Eeprom message, got {:?}", other),
    }
    assert_eq!(session.stats().messages_received(), 2);
    assert_eq!(session.stats().bytes_received(), reply.len() as u64);
    session.disconnect();
}

#[tokio::test]
async fn test_debug_text_and_frames_interleaved() {
    let (session, mut events, mock) = connected_session();
    mock.inject(b"DEBUG boot ok\n");
    mock.inject(&encode(0x10, &[0x01, 0x00, 0x07, 0x00]));

    let event = expect_event(&mut events, |e| {
        matches!(e, Event::Trace(t) if matches!(t.kind, TraceKind::Device { .. }))
    })
    .await;
    match event {
        Event::Trace(trace) => assert_eq!(trace.text, "DEBUG boot ok"),
        other => panic!("Expected Trace, got {:?}", other),
    }

    let event = expect_event(&mut events, |e| matches!(e, Event::Message(_))).await;
    assert_eq!(
        event,
        Event::Message(Message::Alive {
            timestamp_ms: 1,
            counter: 7
        })
    );
    session.disconnect();
}

#[tokio::test]
async fn test_profile_load_by_address_tags_reply() {
    let (session, mut events, mock) = connected_session();
    session.load_profile_at(0x0120).unwrap();

    mock.inject(&encode(0xE1, &[3, 0x5E, 0x01, 0xF4, 0x01, 0x34, 0x21]));
    let event = expect_event(&mut events, |e| matches!(e, Event::Message(_))).await;
    match event {
        Event::Message(Message::Profile(profile)) => {
            assert_eq!(profile.id, 3);
            assert_eq!(profile.address, Some(0x0120));
            assert!((profile.position.height_cm - 3.5).abs() < 1e-9);
            assert!((profile.position.incline_deg - 85.0).abs() < 1e-9);
        }
        other => panic!("Expected Profile message, got {:?}", other),
    }
    session.disconnect();
}

#[tokio::test]
async fn test_corrupt_frame_does_not_stop_session() {
    let (session, mut events, mock) = connected_session();
    let mut bad = encode(0x84, &[0x01]);
    let last = bad.len() - 1;
    bad[last] = 0x00;
    mock.inject(&bad);
    mock.inject(&encode(0x84, &[0x01]));

    expect_event(&mut events, |e| {
        matches!(e, Event::Trace(t) if t.text.starts_with("Invalid frame tail"))
    })
    .await;
    let event = expect_event(&mut events, |e| matches!(e, Event::Message(_))).await;
    match event {
        Event::Message(Message::Eeprom(response)) => {
            assert_eq!(response.operation, EepromOperation::WriteAll);
            assert!(response.success);
        }
        other => panic!("Expected Eeprom message, got {:?}", other),
    }
    assert_eq!(session.stats().errors(), 1);
    assert!(session.is_connected());
    session.disconnect();
}

#[tokio::test]
async fn test_rejected_command_sends_nothing() {
    let (session, _events, mock) = connected_session();

    assert!(matches!(
        session.send_seat_control_request(1.9, 5.0, 85.0),
        Err(SeatLinkError::OutOfRange { .. })
    ));
    session.send_seat_control_request(3.5, 5.0, 85.0).unwrap();

    assert!(wait_until(|| !mock.written().is_empty()));
    let written = mock.written();
    // Only the valid request went out: 0x40 with [350, 500, 8500]
    assert_eq!(written.len(), 6 + 8);
    assert_eq!(written[5], 0x40);
    assert_eq!(&written[6..12], &[0x5E, 0x01, 0xF4, 0x01, 0x34, 0x21]);
    session.disconnect();
}

#[tokio::test]
async fn test_seat_current_position_sends_three_frames() {
    let (session, _events, mock) = connected_session();
    session.send_seat_current_position(3.5, 5.0, 90.0).unwrap();

    assert!(wait_until(|| mock.written().len() == 3 * 10));
    let written = mock.written();
    let ids: Vec<u8> = written.chunks(10).map(|frame| frame[5]).collect();
    assert_eq!(ids, vec![0x30, 0x31, 0x32]);
    // 3.5 cm -> 35 mm, 90 deg -> 1571 mrad
    assert_eq!(&written[6..8], &35u16.to_le_bytes());
    assert_eq!(&written[26..28], &1571i16.to_le_bytes());

    session.send_seat_target(SeatAxis::Slide, 5.0).unwrap();
    assert!(wait_until(|| mock.written().len() == 4 * 10));
    session.disconnect();
}

#[tokio::test]
async fn test_seat_current_position_after_unplug_sends_nothing() {
    let (session, mut events, mock) = connected_session();
    mock.unplug();
    expect_event(&mut events, |e| {
        matches!(e, Event::ConnectionStatus { connected: false, .. })
    })
    .await;

    assert!(matches!(
        session.send_seat_current_position(3.5, 5.0, 90.0),
        Err(SeatLinkError::NotConnected)
    ));
    assert!(mock.written().is_empty());
    assert_eq!(session.queue_depth(), 0);

    session.disconnect();
    let mut sent_traces = 0;
    while let Ok(event) = events.try_recv() {
        if let Event::Trace(trace) = event {
            if trace.kind == (TraceKind::Protocol { direction: Direction::Out }) {
                sent_traces += 1;
            }
        }
    }
    assert_eq!(sent_traces, 0);
}

#[tokio::test]
async fn test_legacy_profile_reports_write_success() {
    let mut config = Config::default();
    config.protocol.profile = CodecProfile::Legacy;
    let (session, mut events, mock) = connected_session_with(config);

    session.write_byte(0x10, 1).unwrap();
    assert!(wait_until(|| mock.written().len() == 12));
    assert_eq!(
        mock.written(),
        vec![0x7E, 0x00, 0x00, 0x00, 0x05, 0x02, 0x00, 0x00, 0x00, 0x10, 0x01, 0x7F]
    );

    mock.inject(&[0x7E, 0x00, 0x00, 0x00, 0x05, 0x82, 0x00, 0x00, 0x00, 0x10, 0x01, 0x7F]);
    let event = expect_event(&mut events, |e| matches!(e, Event::Message(_))).await;
    match event {
        Event::Message(Message::Eeprom(response)) => {
            assert_eq!(response.operation, EepromOperation::WriteByte);
            assert!(response.success);
        }
        other => panic!("Expected Eeprom message, got {:?}", other),
    }
    session.disconnect();
}

#[tokio::test]
async fn test_unverified_checksum_accepted() {
    let mut config = Config::default();
    config.protocol.verify_checksum = false;
    let (session, mut events, mock) = connected_session_with(config);

    let mut bytes = encode(0x82, &[1]);
    let checksum = bytes.len() - 2;
    bytes[checksum] ^= 0xFF;
    mock.inject(&bytes);

    let event = expect_event(&mut events, |e| matches!(e, Event::Message(_))).await;
    assert!(matches!(
        event,
        Event::Message(Message::Eeprom(ref r)) if r.operation == EepromOperation::WriteByte && r.success
    ));
    assert_eq!(session.snapshot().errors, 0);
    session.disconnect();
}

#[tokio::test]
async fn test_unplug_then_reconnect() {
    let (session, mut events, mock) = connected_session();
    expect_event(&mut events, |e| {
        matches!(e, Event::ConnectionStatus { connected: true, .. })
    })
    .await;

    mock.unplug();
    expect_event(&mut events, |e| {
        matches!(e, Event::ConnectionStatus { connected: false, .. })
    })
    .await;
    assert_eq!(session.state(), ConnectionState::Lost);
    assert!(matches!(
        session.send_alive(1, 1),
        Err(SeatLinkError::NotConnected)
    ));

    session.connect_to("MOCK", 115_200).unwrap();
    assert!(session.is_connected());
    session.send_line("status").unwrap();
    assert!(wait_until(|| mock.written().ends_with(b"status\n")));
    session.disconnect();
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[test]
fn test_concurrent_senders_lose_no_updates() {
    let (session, _events, mock) = connected_session();
    let session = Arc::new(session);

    let threads: u64 = 8;
    let per_thread = 100u16;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let session = session.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    session.send_alive(u64::from(t), i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = threads * u64::from(per_thread);
    assert!(wait_until(|| session.stats().messages_sent() == total));
    assert_eq!(session.stats().bytes_sent(), total * 12);
    assert_eq!(mock.written().len() as u64, total * 12);
    assert_eq!(session.queue_depth(), 0);
    session.disconnect();
}
