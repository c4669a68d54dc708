//! Observability and Metrics
//!
//! Counters for the transaction engine. Each client owns its own
//! [`Metrics`], so two clients in one process never mix their counts.
//!
//! Uses atomic counters for thread-safe metrics collection.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct Metrics {
    /// Confirmed requests sent
    pub requests_sent: AtomicU64,
    /// Unconfirmed requests sent (Who-Is, Time-Synchronization)
    pub broadcasts_sent: AtomicU64,
    /// Acks matched to a pending transaction
    pub acks_matched: AtomicU64,
    /// Error, Reject and Abort PDUs matched to a pending transaction
    pub errors_received: AtomicU64,
    /// Transactions expired by the sweeper
    pub timeouts: AtomicU64,
    /// Transactions failed by shutdown
    pub cancellations: AtomicU64,
    /// Replies with no pending transaction
    pub unmatched_dropped: AtomicU64,
    /// Datagrams whose headers could not be decoded
    pub undecodable_datagrams: AtomicU64,
    /// I-Am announcements delivered to subscribers
    pub iam_events: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            broadcasts_sent: AtomicU64::new(0),
            acks_matched: AtomicU64::new(0),
            errors_received: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
            unmatched_dropped: AtomicU64::new(0),
            undecodable_datagrams: AtomicU64::new(0),
            iam_events: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn request_sent(&self, byte_count: u64) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn broadcast_sent(&self, byte_count: u64) {
        self.broadcasts_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn datagram_received(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn ack_matched(&self) {
        self.acks_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_received(&self) {
        self.errors_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timed_out(&self, count: u64) {
        self.timeouts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn cancelled(&self, count: u64) {
        self.cancellations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn unmatched_dropped(&self) {
        self.unmatched_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn undecodable(&self) {
        self.undecodable_datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn iam_event(&self) {
        self.iam_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            broadcasts_sent: self.broadcasts_sent.load(Ordering::Relaxed),
            acks_matched: self.acks_matched.load(Ordering::Relaxed),
            errors_received: self.errors_received.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            unmatched_dropped: self.unmatched_dropped.load(Ordering::Relaxed),
            undecodable_datagrams: self.undecodable_datagrams.load(Ordering::Relaxed),
            iam_events: self.iam_events.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            requests_sent = snapshot.requests_sent,
            broadcasts_sent = snapshot.broadcasts_sent,
            acks_matched = snapshot.acks_matched,
            errors_received = snapshot.errors_received,
            timeouts = snapshot.timeouts,
            cancellations = snapshot.cancellations,
            unmatched_dropped = snapshot.unmatched_dropped,
            undecodable_datagrams = snapshot.undecodable_datagrams,
            iam_events = snapshot.iam_events,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            uptime_seconds = snapshot.uptime_seconds,
            "Client metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub broadcasts_sent: u64,
    pub acks_matched: u64,
    pub errors_received: u64,
    pub timeouts: u64,
    pub cancellations: u64,
    pub unmatched_dropped: u64,
    pub undecodable_datagrams: u64,
    pub iam_events: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let a = Metrics::new();
        let b = Metrics::new();
        a.request_sent(20);
        a.timed_out(2);
        b.unmatched_dropped();

        let snap = a.snapshot();
        assert_eq!(snap.requests_sent, 1);
        assert_eq!(snap.bytes_sent, 20);
        assert_eq!(snap.timeouts, 2);
        assert_eq!(snap.unmatched_dropped, 0);
        assert_eq!(b.snapshot().unmatched_dropped, 1);
    }
}
