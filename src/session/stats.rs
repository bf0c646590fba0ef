//! Link statistics
//!
//! Thread-safe counters updated by the sender thread, the receive thread and
//! the dispatcher. Uses lock-free atomics for all operations.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Link statistics (fully lock-free)
pub struct Stats {
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_received: AtomicU64,
    errors: AtomicU64,
    /// Unix time (ms) of the last successful connect, 0 if never
    connection_time: AtomicU64,
    /// Unix time (ms) of the last send or receive
    last_message_time: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub errors: u64,
    pub connection_time: u64,
    pub last_message_time: u64,
}

#[inline]
fn unix_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

impl Stats {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            connection_time: AtomicU64::new(0),
            last_message_time: AtomicU64::new(0),
        }
    }

    /// Record one buffer written to the port (Host -> ECU)
    #[inline]
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.last_message_time.store(unix_millis(), Ordering::Relaxed);
    }

    /// Record one chunk read from the port (ECU -> Host)
    #[inline]
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.last_message_time.store(unix_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter and stamp the connection time
    pub fn reset_for_connect(&self) {
        for counter in [
            &self.messages_sent,
            &self.bytes_sent,
            &self.messages_received,
            &self.bytes_received,
            &self.errors,
            &self.last_message_time,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.connection_time.store(unix_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_sent: self.messages_sent(),
            bytes_sent: self.bytes_sent(),
            messages_received: self.messages_received(),
            bytes_received: self.bytes_received(),
            errors: self.errors(),
            connection_time: self.connection_time.load(Ordering::Relaxed),
            last_message_time: self.last_message_time.load(Ordering::Relaxed),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters() {
        let stats = Stats::new();
        stats.record_sent(12);
        stats.record_sent(8);
        stats.record_received(100);
        stats.record_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.bytes_sent, 20);
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.bytes_received, 100);
        assert_eq!(snapshot.errors, 1);
        assert!(snapshot.last_message_time > 0);
    }

    #[test]
    fn test_concurrent_sends_lose_nothing() {
        let stats = Arc::new(Stats::new());
        let threads = 8;
        let per_thread = 1000;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let stats = stats.clone();
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        stats.record_sent(t + 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected_bytes: usize = (1..=threads).map(|n| n * per_thread).sum();
        assert_eq!(stats.messages_sent(), (threads * per_thread) as u64);
        assert_eq!(stats.bytes_sent(), expected_bytes as u64);
    }

    #[test]
    fn test_reset_for_connect() {
        let stats = Stats::new();
        assert_eq!(stats.snapshot().connection_time, 0);

        stats.record_sent(5);
        stats.record_error();
        stats.reset_for_connect();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_sent, 0);
        assert_eq!(snapshot.bytes_sent, 0);
        assert_eq!(snapshot.errors, 0);
        assert!(snapshot.connection_time > 0);
    }

    #[test]
    fn test_timestamps_are_wall_clock_millis() {
        let before = chrono::Utc::now().timestamp_millis() as u64;
        let stats = Stats::new();
        stats.reset_for_connect();
        stats.record_received(1);
        let after = chrono::Utc::now().timestamp_millis() as u64;

        let snapshot = stats.snapshot();
        assert!((before..=after).contains(&snapshot.connection_time));
        assert!((before..=after).contains(&snapshot.last_message_time));
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = Stats::new();
        stats.record_sent(3);
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"messages_sent\":1"));
        assert!(json.contains("\"bytes_sent\":3"));
    }
}
