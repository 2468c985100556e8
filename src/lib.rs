//! # sse-stream-client
//!
//! A resilient client for one-directional, SSE-style push streams with
//! auto-reconnection and ordered delivery.
//!
//! ## Features
//!
//! - **Auto-reconnection** with exponential backoff, a fixed 30s delay
//!   ceiling, and a live countdown
//! - **Two transport strategies** behind one contract: a raw push connection,
//!   or a streaming HTTP request when custom headers are needed
//! - **Heartbeat monitoring** to catch silently-dead connections and proxy
//!   idle-timeouts
//! - **Ordered delivery** across reconnects: records caught mid-reconnect are
//!   held and flushed FIFO once the stream is back
//! - **Resumption** via `last-event-id`, advanced as `id:` lines arrive
//! - **Stats** for observability
//!
//! ## Example
//!
//! ```ignore
//! use sse_stream_client::{StreamClient, StreamConfig, StreamContext, StreamHandler, MessageRecord};
//!
//! struct MyHandler;
//!
//! impl StreamHandler for MyHandler {
//!     async fn on_message(&self, record: MessageRecord, _ctx: &StreamContext) {
//!         println!("{}", record.payload);
//!     }
//! }
//!
//! let config = StreamConfig::builder("https://push.example.com/stream").build()?;
//! let client = StreamClient::open(config, MyHandler)?;
//! ```

mod client;
mod config;
mod dispatch;
mod error;
mod handler;
mod heartbeat;
mod parser;
mod session;
mod stats;
mod transport;

pub use client::{ConnectionState, StreamClient};
pub use config::{
    ConfigError, HeartbeatConfig, ReconnectPolicy, StreamConfig, StreamConfigBuilder,
    DELAY_CEILING,
};
pub use error::{Error, ErrorKind};
pub use handler::{StreamContext, StreamHandler};
pub use parser::{MessageRecord, DEFAULT_EVENT_TYPE};
pub use stats::{ConnectionStats, StatsSnapshot};

// Re-export http types for request headers
pub use http::{HeaderMap, HeaderName, HeaderValue};

/// Result type for sse-stream-client operations
pub type Result<T> = std::result::Result<T, Error>;
