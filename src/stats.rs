use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Connection statistics for observability
///
/// Counters and timestamps covering the whole life of one client. Mutated
/// only by the driver task; consumers read a point-in-time copy via
/// `snapshot()`. Never reset except by recreating the client.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    connection_attempts: AtomicU64,
    successful_connections: AtomicU64,
    total_messages_delivered: AtomicU64,
    inner: RwLock<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    last_connected_at: Option<Instant>,
    last_disconnected_at: Option<Instant>,
    last_error_message: Option<String>,
    average_reconnect_duration: Duration,
    /// Number of successful reconnections folded into the average
    reconnect_samples: u64,
}

impl ConnectionStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ========== Getters ==========

    /// Total connection attempts, including the initial one
    pub fn connection_attempts(&self) -> u64 {
        self.connection_attempts.load(Ordering::Relaxed)
    }

    /// Total successfully established connections
    pub fn successful_connections(&self) -> u64 {
        self.successful_connections.load(Ordering::Relaxed)
    }

    /// Total records handed to the consumer, buffered flushes included
    pub fn total_messages_delivered(&self) -> u64 {
        self.total_messages_delivered.load(Ordering::Relaxed)
    }

    // ========== Recording methods (called by the driver) ==========

    pub(crate) fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful connection, folding the recovery duration into
    /// the running average when this attempt followed a disconnect.
    pub(crate) fn record_connected(&self, is_reconnect: bool) {
        let sample = {
            let inner = self.inner.read();
            if is_reconnect {
                inner.last_disconnected_at.map(|t| t.elapsed())
            } else {
                None
            }
        };
        self.record_connected_with_sample(sample);
    }

    pub(crate) fn record_connected_with_sample(&self, reconnect_sample: Option<Duration>) {
        self.successful_connections.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write();
        inner.last_connected_at = Some(Instant::now());
        if let Some(sample) = reconnect_sample {
            let n = inner.reconnect_samples;
            let total = inner.average_reconnect_duration.as_millis() as u64 * n
                + sample.as_millis() as u64;
            inner.average_reconnect_duration = Duration::from_millis(total / (n + 1));
            inner.reconnect_samples = n + 1;
        }
    }

    pub(crate) fn record_disconnected(&self, error: Option<&str>) {
        let mut inner = self.inner.write();
        inner.last_disconnected_at = Some(Instant::now());
        if let Some(message) = error {
            inner.last_error_message = Some(message.to_string());
        }
    }

    pub(crate) fn record_delivered(&self) {
        self.total_messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot for export
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.read();
        StatsSnapshot {
            connection_attempts: self.connection_attempts.load(Ordering::Acquire),
            successful_connections: self.successful_connections.load(Ordering::Acquire),
            total_messages_delivered: self.total_messages_delivered.load(Ordering::Acquire),
            last_connected_at: inner.last_connected_at,
            last_disconnected_at: inner.last_disconnected_at,
            last_error_message: inner.last_error_message.clone(),
            average_reconnect_duration: inner.average_reconnect_duration,
        }
    }
}

/// A point-in-time copy of all connection statistics
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub connection_attempts: u64,
    pub successful_connections: u64,
    pub total_messages_delivered: u64,
    pub last_connected_at: Option<Instant>,
    pub last_disconnected_at: Option<Instant>,
    pub last_error_message: Option<String>,
    pub average_reconnect_duration: Duration,
}
