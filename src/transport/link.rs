//! Serial link with background I/O threads
//!
//! Uses blocking threads per open port:
//! - Reader thread: reads chunks and hands them to the byte sink in order
//! - Sender thread: drains the unbounded send queue and writes FIFO
//!
//! The link stops when:
//! - `disconnect()` is called (bounded wait for both threads)
//! - The port disappears (detected via read/write errors or a run of empty
//!   reads), in which case the state becomes `Lost`

use super::{ByteSink, Connector, PortPair};
use crate::config::LinkConfig;
use crate::constants::SERIAL_DISCONNECT_THRESHOLD;
use crate::error::{Result, SeatLinkError};
use crate::events::EventSink;
use crate::session::stats::Stats;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Link connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Port vanished while connected; `disconnect()` or `connect()` clears it
    Lost,
}

/// State shared with the I/O threads
struct Shared {
    state: RwLock<ConnectionState>,
    stats: Arc<Stats>,
    events: EventSink,
}

/// Resources of the currently open port
struct ActiveLink {
    port: String,
    tx: mpsc::UnboundedSender<Bytes>,
    shutdown: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    done_rx: std_mpsc::Receiver<()>,
    threads: Vec<JoinHandle<()>>,
    disconnect_timeout: Duration,
}

/// Owner of at most one open serial connection
pub struct Link {
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveLink>>,
}

impl Link {
    pub fn new(connector: Arc<dyn Connector>, stats: Arc<Stats>, events: EventSink) -> Self {
        Self {
            connector,
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Disconnected),
                stats,
                events,
            }),
            active: Mutex::new(None),
        }
    }

    /// Open the port and start the I/O threads
    ///
    /// A link that is already open is disconnected first.
    pub fn connect(&self, settings: &LinkConfig, sink: ByteSink) -> Result<()> {
        if self.active.lock().is_some() {
            self.disconnect();
        }

        *self.shared.state.write() = ConnectionState::Connecting;
        let pair = match self.connector.open(settings) {
            Ok(pair) => pair,
            Err(e) => {
                *self.shared.state.write() = ConnectionState::Disconnected;
                self.shared.stats.record_error();
                self.shared.events.error(e.to_string());
                return Err(e);
            }
        };

        self.shared.stats.reset_for_connect();

        let port = settings.port.clone();
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        let (done_tx, done_rx) = std_mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicUsize::new(0));

        // Threads may report Lost immediately, so publish Connected first
        *self.shared.state.write() = ConnectionState::Connected;

        let PortPair { reader, writer } = pair;
        let threads = vec![
            spawn_reader(
                reader,
                sink,
                settings.chunk_size(),
                IoContext::new(&self.shared, &shutdown, &port, done_tx.clone()),
            ),
            spawn_sender(
                writer,
                rx,
                queued.clone(),
                IoContext::new(&self.shared, &shutdown, &port, done_tx),
            ),
        ];

        *self.active.lock() = Some(ActiveLink {
            port: port.clone(),
            tx,
            shutdown,
            queued,
            done_rx,
            threads,
            disconnect_timeout: settings.disconnect_timeout(),
        });

        info!("Connected to {} @ {} baud", port, settings.baud_rate);
        self.shared
            .events
            .system(format!("Connected to {} @ {} baud", port, settings.baud_rate));
        self.shared.events.connection(true, port);
        Ok(())
    }

    /// Stop the I/O threads and close the port (idempotent)
    ///
    /// Waits at most the configured disconnect timeout; threads still running
    /// after that are detached and exit on their own.
    pub fn disconnect(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };

        let previous = *self.shared.state.read();
        active.shutdown.store(true, Ordering::SeqCst);
        // Closing the queue wakes the sender; anything still queued is dropped
        drop(active.tx);

        let deadline = Instant::now() + active.disconnect_timeout;
        let mut finished = 0;
        while finished < active.threads.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match active.done_rx.recv_timeout(remaining) {
                Ok(()) => finished += 1,
                Err(_) => break,
            }
        }

        if finished == active.threads.len() {
            for handle in active.threads {
                let _ = handle.join();
            }
        } else {
            warn!(
                "I/O threads for {} did not stop within {:?}, detaching",
                active.port, active.disconnect_timeout
            );
        }

        *self.shared.state.write() = ConnectionState::Disconnected;
        info!("Disconnected from {}", active.port);
        self.shared
            .events
            .system(format!("Disconnected from {}", active.port));
        if previous == ConnectionState::Connected {
            self.shared.events.connection(false, active.port);
        }
    }

    /// Queue bytes for the sender thread (never blocks)
    ///
    /// Fails with `NotConnected` (also reported as an event) when no link is
    /// open; the bytes are dropped.
    pub fn send(&self, bytes: Bytes) -> Result<()> {
        self.send_all(vec![bytes])
    }

    /// Queue several buffers back to back
    ///
    /// The connection is checked once with the link held, so either every
    /// buffer is queued in order or none is.
    pub fn send_all(&self, buffers: Vec<Bytes>) -> Result<()> {
        let active = self.active.lock();
        match active.as_ref() {
            Some(link) if self.state() == ConnectionState::Connected => {
                for bytes in buffers {
                    link.queued.fetch_add(1, Ordering::Relaxed);
                    link.tx.send(bytes).map_err(|_| {
                        link.queued.fetch_sub(1, Ordering::Relaxed);
                        SeatLinkError::NotConnected
                    })?;
                }
                Ok(())
            }
            _ => {
                let err = SeatLinkError::NotConnected;
                self.shared.events.error(err.to_string());
                Err(err)
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// True while connected and the I/O threads are running
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && self.active.lock().is_some()
    }

    /// Name of the open (or lost) port
    pub fn port(&self) -> Option<String> {
        self.active.lock().as_ref().map(|a| a.port.clone())
    }

    /// Buffers waiting for the sender thread
    pub fn queue_depth(&self) -> usize {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.queued.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// What each I/O thread needs to report back
struct IoContext {
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    port: String,
    done: std_mpsc::Sender<()>,
}

impl IoContext {
    fn new(
        shared: &Arc<Shared>,
        shutdown: &Arc<AtomicBool>,
        port: &str,
        done: std_mpsc::Sender<()>,
    ) -> Self {
        Self {
            shared: shared.clone(),
            shutdown: shutdown.clone(),
            port: port.to_string(),
            done,
        }
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Report a vanished port once; no-op while disconnecting
    fn connection_lost(&self, reason: String) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.shared.state.write();
            if *state != ConnectionState::Connected {
                return;
            }
            *state = ConnectionState::Lost;
        }
        self.shared.stats.record_error();
        let err = SeatLinkError::PortClosedUnexpectedly { reason };
        warn!("Connection lost on {}: {}", self.port, err);
        self.shared.events.error(format!("Connection lost: {}", err));
        self.shared.events.connection(false, self.port.clone());
    }
}

/// Error kinds that mean the port itself is gone
fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::UnexpectedEof
            | ErrorKind::NotFound
            | ErrorKind::PermissionDenied
    )
}

fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    mut sink: ByteSink,
    chunk_size: usize,
    ctx: IoContext,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = vec![0u8; chunk_size];
        let mut consecutive_errors = 0u32;

        while !ctx.stopping() {
            match reader.read(&mut buf) {
                Ok(n) if n > 0 => {
                    consecutive_errors = 0;
                    ctx.shared.stats.record_received(n);
                    sink(&buf[..n]);
                }
                Ok(_) => {
                    // Zero bytes read - could be normal or port gone
                    consecutive_errors += 1;
                    if consecutive_errors > SERIAL_DISCONNECT_THRESHOLD {
                        ctx.connection_lost("no data from port".into());
                    }
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    consecutive_errors = 0;
                }
                Err(e) => {
                    if ctx.stopping() {
                        break;
                    }
                    let kind = e.kind();
                    ctx.shared.stats.record_error();
                    ctx.shared
                        .events
                        .error(SeatLinkError::ReadFailed { source: e }.to_string());
                    consecutive_errors += 1;
                    if is_disconnect(kind) || consecutive_errors > SERIAL_DISCONNECT_THRESHOLD {
                        ctx.connection_lost(format!("read failed ({:?})", kind));
                    }
                }
            }
        }
        debug!("Reader thread for {} stopped", ctx.port);
        let _ = ctx.done.send(());
    })
}

/// Outcome of writing one queued buffer
enum WriteOutcome {
    Complete,
    Short(usize),
    Failed(std::io::Error),
}

fn write_buffer(writer: &mut dyn Write, data: &[u8]) -> WriteOutcome {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => return WriteOutcome::Short(written),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::TimedOut => return WriteOutcome::Short(written),
            Err(e) => return WriteOutcome::Failed(e),
        }
    }
    match writer.flush() {
        Ok(()) => WriteOutcome::Complete,
        Err(e) if e.kind() == ErrorKind::TimedOut => WriteOutcome::Complete,
        Err(e) => WriteOutcome::Failed(e),
    }
}

fn spawn_sender(
    mut writer: Box<dyn Write + Send>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    queued: Arc<AtomicUsize>,
    ctx: IoContext,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Some(data) = rx.blocking_recv() {
            queued.fetch_sub(1, Ordering::Relaxed);
            if ctx.stopping() {
                break;
            }

            match write_buffer(writer.as_mut(), &data) {
                WriteOutcome::Complete => ctx.shared.stats.record_sent(data.len()),
                WriteOutcome::Short(written) => {
                    ctx.shared.stats.record_error();
                    ctx.shared.events.error(
                        SeatLinkError::WriteFailed {
                            written,
                            expected: data.len(),
                        }
                        .to_string(),
                    );
                }
                WriteOutcome::Failed(e) => {
                    ctx.shared.stats.record_error();
                    ctx.shared.events.error(format!("Send error: {}", e));
                    if is_disconnect(e.kind()) {
                        ctx.connection_lost(format!("write failed ({:?})", e.kind()));
                        break;
                    }
                }
            }
        }
        // Dropping rx discards anything still queued
        debug!("Sender thread for {} stopped", ctx.port);
        let _ = ctx.done.send(());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, Event};
    use std::io;
    use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};

    /// Reader fed from a channel; a dropped feeder looks like an unplugged port
    struct ChannelReader(Receiver<Vec<u8>>);

    impl Read for ChannelReader {
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

    #[derive(Clone, Default)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct TestConnector {
        feed: Mutex<Option<Receiver<Vec<u8>>>>,
        written: SharedWriter,
    }

    impl Connector for TestConnector {
        fn open(&self, settings: &LinkConfig) -> Result<PortPair> {
            if settings.port == "missing" {
                return Err(SeatLinkError::PortNotFound {
                    port: settings.port.clone(),
                });
            }
            let feed = self.feed.lock().take().ok_or_else(|| SeatLinkError::OpenFailed {
                port: settings.port.clone(),
                source: io::Error::other("busy"),
            })?;
            Ok(PortPair {
                reader: Box::new(ChannelReader(feed)),
                writer: Box::new(self.written.clone()),
            })
        }
    }

    fn setup() -> (
        Link,
        Sender<Vec<u8>>,
        SharedWriter,
        Arc<Stats>,
        tokio::sync::mpsc::Receiver<Event>,
    ) {
        let (feed_tx, feed_rx) = std_mpsc::channel();
        let written = SharedWriter::default();
        let connector = Arc::new(TestConnector {
            feed: Mutex::new(Some(feed_rx)),
            written: written.clone(),
        });
        let stats = Arc::new(Stats::new());
        let (sink, events) = events::channel(256);
        (Link::new(connector, stats.clone(), sink), feed_tx, written, stats, events)
    }

    fn settings(port: &str) -> LinkConfig {
        LinkConfig::for_port(port, 115_200)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn drain(events: &mut tokio::sync::mpsc::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_send_while_disconnected() {
        let (link, _feed, written, _stats, mut events) = setup();
        let result = link.send(Bytes::from_static(&[1, 2, 3]));

        assert!(matches!(result, Err(SeatLinkError::NotConnected)));
        assert!(written.0.lock().is_empty());
        assert!(drain(&mut events).iter().any(|e| matches!(
            e,
            Event::Trace(t) if t.text == "Cannot send - not connected"
        )));
    }

    #[test]
    fn test_connect_send_receive_disconnect() {
        let (link, feed, written, stats, mut events) = setup();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_buf = received.clone();

        link.connect(
            &settings("ttyTEST"),
            Box::new(move |chunk: &[u8]| sink_buf.lock().extend_from_slice(chunk)),
        )
        .unwrap();
        assert!(link.is_connected());
        assert_eq!(link.port().as_deref(), Some("ttyTEST"));

        link.send(Bytes::from_static(b"abc")).unwrap();
        link.send(Bytes::from_static(b"defg")).unwrap();
        assert!(wait_for(|| written.0.lock().len() == 7));
        assert_eq!(written.0.lock().as_slice(), b"abcdefg");
        assert!(wait_for(|| stats.messages_sent() == 2));
        assert_eq!(stats.bytes_sent(), 7);

        feed.send(b"hello".to_vec()).unwrap();
        assert!(wait_for(|| received.lock().len() == 5));
        assert_eq!(stats.messages_received(), 1);
        assert_eq!(stats.bytes_received(), 5);

        link.disconnect();
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.is_connected());
        link.disconnect();

        let statuses: Vec<bool> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                Event::ConnectionStatus { connected, .. } => Some(connected),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![true, false]);
    }

    #[test]
    fn test_send_all_is_all_or_nothing() {
        let (link, feed, written, stats, _events) = setup();
        assert!(matches!(
            link.send_all(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]),
            Err(SeatLinkError::NotConnected)
        ));
        assert!(written.0.lock().is_empty());

        link.connect(&settings("ttyTEST"), Box::new(|_: &[u8]| {})).unwrap();
        link.send_all(vec![
            Bytes::from_static(b"ab"),
            Bytes::from_static(b"cd"),
            Bytes::from_static(b"e"),
        ])
        .unwrap();
        assert!(wait_for(|| stats.messages_sent() == 3));
        assert_eq!(written.0.lock().as_slice(), b"abcde");

        drop(feed);
        assert!(wait_for(|| link.state() == ConnectionState::Lost));
        let before = written.0.lock().len();
        assert!(link
            .send_all(vec![Bytes::from_static(b"x"), Bytes::from_static(b"y")])
            .is_err());
        assert_eq!(link.queue_depth(), 0);
        assert_eq!(written.0.lock().len(), before);
    }

    #[test]
    fn test_port_not_found() {
        let (link, _feed, _written, stats, _events) = setup();
        let result = link.connect(&settings("missing"), Box::new(|_: &[u8]| {}));

        assert!(matches!(result, Err(SeatLinkError::PortNotFound { .. })));
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert_eq!(stats.errors(), 1);
    }

    #[test]
    fn test_unplugged_port_becomes_lost() {
        let (link, feed, _written, _stats, mut events) = setup();
        link.connect(&settings("ttyTEST"), Box::new(|_: &[u8]| {})).unwrap();

        drop(feed);
        assert!(wait_for(|| link.state() == ConnectionState::Lost));
        assert!(!link.is_connected());
        assert!(matches!(
            link.send(Bytes::from_static(&[0])),
            Err(SeatLinkError::NotConnected)
        ));

        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::ConnectionStatus {
                connected: false,
                ..
            }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Trace(t) if t.text.starts_with("Connection lost")
        )));

        link.disconnect();
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_short_write_counts_error() {
        struct ZeroWriter;
        impl Write for ZeroWriter {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        match write_buffer(&mut ZeroWriter, &[1, 2, 3]) {
            WriteOutcome::Short(0) => {}
            _ => panic!("Expected short write"),
        }
        let mut ok = SharedWriter::default();
        assert!(matches!(
            write_buffer(&mut ok, &[1, 2, 3]),
            WriteOutcome::Complete
        ));
    }
}
