use std::time::Duration;

use http::HeaderMap;

/// Hard ceiling on the computed reconnect delay. Not configurable.
pub const DELAY_CEILING: Duration = Duration::from_millis(30_000);

/// Configuration for a [`StreamClient`](crate::StreamClient).
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream endpoint URL (http or https)
    pub url: String,
    /// Extra request headers. A non-empty map forces the fallback transport,
    /// since the native push primitive cannot attach arbitrary headers.
    pub headers: HeaderMap,
    /// Reconnection backoff settings
    pub reconnect: ReconnectPolicy,
    /// Heartbeat liveness settings
    pub heartbeat: HeartbeatConfig,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Promote state-transition logs from debug to info level
    pub debug: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: HeaderMap::new(),
            reconnect: ReconnectPolicy::default(),
            heartbeat: HeartbeatConfig::default(),
            connect_timeout: Duration::from_secs(10),
            debug: false,
        }
    }
}

impl StreamConfig {
    /// Create a new builder for configuration
    pub fn builder(url: impl Into<String>) -> StreamConfigBuilder {
        StreamConfigBuilder {
            config: StreamConfig {
                url: url.into(),
                ..Default::default()
            },
        }
    }
}

/// Builder for StreamConfig
#[derive(Debug, Clone)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    /// Set extra request headers (forces the fallback transport when non-empty)
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Add a single request header
    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.config.headers.insert(name, value);
        self
    }

    /// Set reconnection policy
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Set the maximum number of automatic reconnection attempts
    pub fn max_reconnect_attempts(mut self, max: u32) -> Self {
        self.config.reconnect.max_attempts = max;
        self
    }

    /// Set the base reconnection delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.base_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.reconnect.multiplier = multiplier;
        self
    }

    /// Set heartbeat configuration
    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.config.heartbeat = heartbeat;
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Enable verbose state-transition logging
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Build the configuration with validation.
    pub fn build(self) -> Result<StreamConfig, ConfigError> {
        let parsed = url::Url::parse(&self.config.url)
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        if self.config.reconnect.base_delay.is_zero() {
            return Err(ConfigError::InvalidBackoff(
                "base_delay must be > 0".to_string(),
            ));
        }
        if self.config.reconnect.multiplier < 1.0 || !self.config.reconnect.multiplier.is_finite() {
            return Err(ConfigError::InvalidBackoff(
                "multiplier must be >= 1.0".to_string(),
            ));
        }

        if self.config.heartbeat.interval.is_zero() {
            return Err(ConfigError::InvalidHeartbeat(
                "interval must be > 0".to_string(),
            ));
        }
        if let Some(timeout) = self.config.heartbeat.data_timeout {
            if timeout < self.config.heartbeat.interval {
                return Err(ConfigError::InvalidHeartbeat(
                    "data_timeout should be >= interval".to_string(),
                ));
            }
        }

        Ok(self.config)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// URL missing, unparseable, or not http(s)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Invalid backoff configuration
    #[error("Invalid backoff configuration: {0}")]
    InvalidBackoff(String),
    /// Invalid heartbeat configuration
    #[error("Invalid heartbeat configuration: {0}")]
    InvalidHeartbeat(String),
}

/// Backoff policy for reconnection
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum number of automatic reconnection attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first reconnection attempt
    pub base_delay: Duration,
    /// Multiplier for exponential backoff (typically 2.0)
    pub multiplier: f64,
    /// Whether to add random full jitter to delays
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl ReconnectPolicy {
    /// Calculate the delay for a given attempt number (1-indexed).
    ///
    /// `delay = min(base_delay * multiplier^(attempt - 1), DELAY_CEILING)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base_delay =
            self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        let capped_delay = base_delay.min(DELAY_CEILING.as_millis() as f64);

        if self.jitter {
            // Full jitter: random value between 0 and capped_delay
            let jittered = rand::random::<f64>() * capped_delay;
            Duration::from_millis(jittered as u64)
        } else {
            Duration::from_millis(capped_delay as u64)
        }
    }
}

/// Heartbeat liveness configuration
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between liveness checks of the active transport
    pub interval: Duration,
    /// Treat the connection as stale when no line arrived for this long.
    /// `None` disables the data check; the open-state check always runs.
    pub data_timeout: Option<Duration>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            data_timeout: None,
        }
    }
}
