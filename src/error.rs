use thiserror::Error;

/// Categorizes errors for handler decision-making.
///
/// This is a lightweight, cloneable representation of the error type
/// that can be passed to handler callbacks for error-type-based decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket-level I/O failure
    Io,
    /// HTTP client failure (fallback transport)
    Http,
    /// TLS handshake failure
    Tls,
    /// Server answered with a non-2xx status
    InvalidStatus,
    /// Server answered 2xx but the body carried no bytes
    EmptyBody,
    /// Connection could not be established (timeout, refused, DNS)
    ConnectFailed,
    /// Server closed the stream
    StreamEnded,
    /// Heartbeat check found the transport no longer open
    HeartbeatStale,
    /// All automatic reconnection attempts used up
    ReconnectsExhausted,
    /// Client has been closed
    Closed,
    /// Other error
    Other,
}

/// Errors that can occur in sse-stream-client
#[derive(Error, Debug)]
pub enum Error {
    /// Socket-level I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error from the fallback transport
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TLS handshake error from the native transport
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// The configured or resumed URL could not be parsed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Server responded with a non-success status
    #[error("Server responded with status {0}")]
    InvalidStatus(u16),

    /// Server responded 2xx but the body ended before any byte arrived
    #[error("Server returned an empty response body")]
    EmptyBody,

    /// Connection attempt failed before the stream opened
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Server ended the stream (EOF on the push connection)
    #[error("Stream ended by server")]
    StreamEnded,

    /// Synthesized by the heartbeat monitor for a silently-dead transport
    #[error("Heartbeat found the transport no longer open")]
    HeartbeatStale,

    /// All automatic reconnection attempts have been used up
    #[error("Reconnect attempts exhausted after {attempts} failures")]
    ReconnectsExhausted { attempts: u32 },

    /// The client was closed; only recreation can revive it
    #[error("Client is closed")]
    Closed,
}

impl Error {
    /// Get the kind of this error for decision-making.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Http(_) => ErrorKind::Http,
            Error::Tls(_) => ErrorKind::Tls,
            Error::InvalidStatus(_) => ErrorKind::InvalidStatus,
            Error::EmptyBody => ErrorKind::EmptyBody,
            Error::ConnectFailed(_) => ErrorKind::ConnectFailed,
            Error::StreamEnded => ErrorKind::StreamEnded,
            Error::HeartbeatStale => ErrorKind::HeartbeatStale,
            Error::ReconnectsExhausted { .. } => ErrorKind::ReconnectsExhausted,
            Error::Closed => ErrorKind::Closed,
            Error::Url(_) => ErrorKind::Other,
        }
    }
}
