//! Example: consuming a price-ticker push stream
//!
//! This example demonstrates how to implement a StreamHandler for an
//! SSE-style ticker endpoint, including typed heartbeat events.
//!
//! Run with: cargo run --example ticker -- http://127.0.0.1:8000/stream

use std::time::Duration;

use sse_stream_client::{
    ConnectionState, ErrorKind, MessageRecord, StreamClient, StreamConfig, StreamContext,
    StreamHandler,
};
use tracing::{info, warn, Level};

/// Ticker stream handler
struct TickerHandler;

impl StreamHandler for TickerHandler {
    async fn on_message(&self, record: MessageRecord, _ctx: &StreamContext) {
        info!(
            event_type = %record.event_type,
            event_id = record.event_id.as_deref().unwrap_or("-"),
            "tick: {}",
            &record.payload[..record.payload.len().min(100)]
        );
    }

    async fn on_connect(&self, ctx: &StreamContext) {
        info!(
            stream_id = %ctx.stream_id,
            reconnect = ctx.is_reconnect,
            "connected"
        );
    }

    async fn on_error(&self, kind: ErrorKind, message: &str, _ctx: &StreamContext) {
        warn!(?kind, message, "stream error");
    }

    async fn on_max_reconnects(&self, _ctx: &StreamContext) {
        warn!("gave up reconnecting; call reconnect() to resume");
    }

    fn handles_event(&self, event_type: &str) -> bool {
        // The ticker tags its keepalives as `event: heartbeat` with no data
        event_type == "heartbeat"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000/stream".to_string());

    info!("Connecting to {}", url);

    let config = StreamConfig::builder(&url)
        .max_reconnect_attempts(5)
        .reconnect_delay(Duration::from_secs(1))
        .debug(true)
        .build()?;

    let client = StreamClient::open(config, TickerHandler)?;

    // Run for a while, showing the observable state
    info!("Running... Press Ctrl+C to stop");
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if client.state() == ConnectionState::Connecting && client.reconnect_countdown() > 0 {
            info!(
                "reconnecting in {}s (state: {})",
                client.reconnect_countdown(),
                client.state()
            );
        }
    }

    // Print final stats
    let stats = client.stats();
    info!("Final stats:");
    info!("  Connection attempts: {}", stats.connection_attempts);
    info!("  Successful connections: {}", stats.successful_connections);
    info!("  Messages delivered: {}", stats.total_messages_delivered);
    info!(
        "  Avg reconnect duration: {:?}",
        stats.average_reconnect_duration
    );

    // Graceful shutdown
    client.close().await;
    info!("Closed");

    Ok(())
}
