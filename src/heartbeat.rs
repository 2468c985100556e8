use std::time::Instant;

use crate::config::HeartbeatConfig;

/// Why the heartbeat declared the connection dead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StaleReason {
    /// The transport handle no longer reports an open readiness state
    TransportClosed,
    /// No line arrived within the configured data timeout
    DataTimeout,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::TransportClosed => write!(f, "transport closed"),
            StaleReason::DataTimeout => write!(f, "data timeout"),
        }
    }
}

/// Tracks liveness state for a single connection.
///
/// Created fresh on every successful (re)connection and dropped with it, so
/// the interval timer and the data clock never outlive the connection they
/// watch. The push protocol has no client-to-server channel, so liveness is
/// judged from the transport's own open state and the flow of data.
#[derive(Debug)]
pub(crate) struct HeartbeatMonitor {
    config: HeartbeatConfig,
    /// Time of last line received
    last_data_received: Instant,
}

impl HeartbeatMonitor {
    /// Create a new monitor
    pub(crate) fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            // Start with "just received data"
            last_data_received: Instant::now(),
        }
    }

    /// Record that a line arrived on the transport
    pub(crate) fn record_data_received(&mut self) {
        self.last_data_received = Instant::now();
    }

    /// Judge the connection, given the transport's current open state.
    ///
    /// Returns the reason when the connection should be torn down and
    /// reconnected; `None` while it still looks alive.
    pub(crate) fn check(&self, transport_open: bool) -> Option<StaleReason> {
        if !transport_open {
            return Some(StaleReason::TransportClosed);
        }

        if let Some(timeout) = self.config.data_timeout {
            if self.last_data_received.elapsed() >= timeout {
                return Some(StaleReason::DataTimeout);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_millis(50),
            data_timeout: Some(Duration::from_millis(100)),
        }
    }

    #[test]
    fn test_initial_state_is_alive() {
        let monitor = HeartbeatMonitor::new(test_config());
        assert_eq!(monitor.check(true), None);
    }

    #[test]
    fn test_closed_transport_is_stale() {
        let monitor = HeartbeatMonitor::new(test_config());
        assert_eq!(monitor.check(false), Some(StaleReason::TransportClosed));
    }

    #[tokio::test]
    async fn test_data_timeout() {
        let monitor = HeartbeatMonitor::new(test_config());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(monitor.check(true), Some(StaleReason::DataTimeout));
    }

    #[tokio::test]
    async fn test_data_received_resets_timeout() {
        let mut monitor = HeartbeatMonitor::new(test_config());

        tokio::time::sleep(Duration::from_millis(70)).await;
        monitor.record_data_received();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(monitor.check(true), None);
    }

    #[test]
    fn test_no_data_timeout_configured() {
        let monitor = HeartbeatMonitor::new(HeartbeatConfig {
            interval: Duration::from_millis(50),
            data_timeout: None,
        });

        // Only the open-state check applies
        assert_eq!(monitor.check(true), None);
        assert_eq!(monitor.check(false), Some(StaleReason::TransportClosed));
    }
}
