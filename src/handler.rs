use std::future::Future;

use crate::error::ErrorKind;
use crate::parser::MessageRecord;

/// Connection state information passed to handlers
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Identifier of the logical stream, constant across reconnections
    pub stream_id: String,
    /// Whether the current connection is a reconnection (vs initial)
    pub is_reconnect: bool,
    /// Number of reconnection attempts since the last success
    pub reconnect_attempt: u32,
}

/// Trait that consumers implement to receive stream events.
///
/// The client owns the connection lifecycle, reconnection, and heartbeat
/// monitoring; the handler processes records and observes lifecycle events.
/// Only `on_message` is required.
///
/// Errors reported through `on_error` are observability only: retry policy
/// lives entirely in the client, so the handler cannot veto or force a
/// reconnection from here (use
/// [`StreamClient::reconnect`](crate::StreamClient::reconnect) for manual
/// control).
///
/// # Example
///
/// ```ignore
/// use sse_stream_client::{MessageRecord, StreamContext, StreamHandler};
///
/// struct TickerHandler;
///
/// impl StreamHandler for TickerHandler {
///     async fn on_message(&self, record: MessageRecord, _ctx: &StreamContext) {
///         println!("{}: {}", record.event_type, record.payload);
///     }
///
///     fn handles_event(&self, event_type: &str) -> bool {
///         event_type == "heartbeat"
///     }
/// }
/// ```
pub trait StreamHandler: Send + Sync + 'static {
    /// Called once per delivered record, in wire-arrival order.
    ///
    /// Records held back during a reconnection are flushed through here, in
    /// their original order, before any newly arriving record.
    fn on_message(
        &self,
        record: MessageRecord,
        ctx: &StreamContext,
    ) -> impl Future<Output = ()> + Send;

    /// Called after each successful connection, initial or re-established.
    fn on_connect(&self, _ctx: &StreamContext) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called when a transport error occurs.
    ///
    /// Fires for every failure the client recovers from, in addition to the
    /// reconnection machinery it drives internally.
    fn on_error(
        &self,
        _kind: ErrorKind,
        _message: &str,
        _ctx: &StreamContext,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called exactly once when automatic reconnection gives up.
    ///
    /// The client stays disconnected afterwards until
    /// [`reconnect`](crate::StreamClient::reconnect) is called.
    fn on_max_reconnects(&self, _ctx: &StreamContext) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Event types this handler claims.
    ///
    /// A claimed type dispatches a synthetic record straight from its
    /// `event:` line, without waiting for a `data:` line.
    fn handles_event(&self, _event_type: &str) -> bool {
        false
    }
}
