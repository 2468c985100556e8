use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use http::HeaderMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;

/// Capacity of the event channel between a transport pump and the driver
const EVENT_CHANNEL_CAPACITY: usize = 256;

// Limits for response parsing on the native path
const MAX_HEADERS: usize = 100;
const MAX_TOTAL_HEADER_SIZE: usize = 16 * 1024;
const MAX_HEADER_LINE: usize = 8 * 1024;
/// Protocol lines can carry sizable payloads
const MAX_BODY_LINE: usize = 512 * 1024;

/// Events emitted by a live transport
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// The stream is validated and live
    Open,
    /// One complete protocol line, newline stripped
    Line(String),
    /// The transport died
    Failed(Error),
    /// The server ended the stream cleanly
    Closed,
}

/// One live connection attempt.
///
/// Replaced, never mutated, on every reconnection; at most one handle is
/// alive at any time. The pump task feeding `events` is aborted by
/// [`shutdown`](TransportHandle::shutdown) before a new attempt starts.
#[derive(Debug)]
pub(crate) struct TransportHandle {
    events: mpsc::Receiver<TransportEvent>,
    open: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Whether the transport still reports an open readiness state
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Receive the next transport event
    pub(crate) async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Take an already-queued event without waiting
    pub(crate) fn try_next_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    /// Tear the connection down and wait for the pump task to finish
    pub(crate) async fn shutdown(mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Capability contract shared by both transport strategies.
#[async_trait]
pub(crate) trait Transport: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Establish one connection attempt to `url`.
    ///
    /// Validates the response and returns a handle whose first event is
    /// [`TransportEvent::Open`]. Never retries internally; retry policy
    /// belongs to the driver alone.
    async fn connect(&self, url: Url) -> Result<TransportHandle, Error>;
}

/// Pick the transport strategy for a session.
///
/// Custom headers force the fallback, since the native push primitive
/// cannot attach arbitrary headers to its request.
pub(crate) fn select_transport(
    headers: &HeaderMap,
    connect_timeout: Duration,
) -> Box<dyn Transport> {
    if headers.is_empty() {
        Box::new(NativeTransport)
    } else {
        Box::new(FallbackTransport::new(headers.clone(), connect_timeout))
    }
}

// ---------------------------------------------------------------------------
// Native transport
// ---------------------------------------------------------------------------

/// Direct push connection over a raw socket.
///
/// Speaks a minimal HTTP/1.0 `GET` so the body arrives unframed, then reads
/// protocol lines straight off the socket.
pub(crate) struct NativeTransport;

#[async_trait]
impl Transport for NativeTransport {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn connect(&self, url: Url) -> Result<TransportHandle, Error> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::ConnectFailed("no host in URL".to_string()))?
            .to_string();
        let is_tls = url.scheme() == "https";
        let port = url.port().unwrap_or(if is_tls { 443 } else { 80 });

        debug!(%url, %host, port, is_tls, "native transport connecting");

        let tcp = connect_direct(&host, port).await?;
        set_tcp_options(&tcp);

        if is_tls {
            let connector =
                tokio_native_tls::TlsConnector::from(native_tls::TlsConnector::new()?);
            let stream = connector.connect(&host, tcp).await?;
            start_native_stream(stream, &host, &url).await
        } else {
            start_native_stream(tcp, &host, &url).await
        }
    }
}

/// Issue the push request and validate the response, then hand the socket to
/// a line pump.
async fn start_native_stream<S>(
    mut stream: S,
    host: &str,
    url: &Url,
) -> Result<TransportHandle, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    // HTTP/1.0 keeps the body unframed: the server streams raw lines until close
    let request = format!(
        "GET {} HTTP/1.0\r\nHost: {}\r\nAccept: text/event-stream\r\n\r\n",
        target, host
    );
    stream.write_all(request.as_bytes()).await?;

    let mut reader = BufReader::new(stream);

    // Status line
    let mut status_line = String::new();
    let bytes_read = read_line_limited(&mut reader, &mut status_line, MAX_HEADER_LINE).await?;
    if bytes_read == 0 {
        return Err(Error::ConnectFailed(
            "server closed connection before responding".to_string(),
        ));
    }
    let status = parse_http_status_line(&status_line).ok_or_else(|| {
        Error::ConnectFailed(format!("invalid status line: {}", status_line.trim()))
    })?;
    if !(200..300).contains(&status) {
        return Err(Error::InvalidStatus(status));
    }

    // Skip response headers until the blank line, with limits
    let mut header_count = 0;
    let mut total_bytes = bytes_read;
    loop {
        if header_count >= MAX_HEADERS {
            return Err(Error::ConnectFailed(format!(
                "server sent too many headers (>{})",
                MAX_HEADERS
            )));
        }
        if total_bytes >= MAX_TOTAL_HEADER_SIZE {
            return Err(Error::ConnectFailed(format!(
                "response headers too large (>{} bytes)",
                MAX_TOTAL_HEADER_SIZE
            )));
        }

        let mut line = String::new();
        let bytes_read = read_line_limited(&mut reader, &mut line, MAX_HEADER_LINE).await?;
        if bytes_read == 0 {
            return Err(Error::ConnectFailed(
                "server closed connection during headers".to_string(),
            ));
        }
        total_bytes += bytes_read;
        header_count += 1;

        if line.trim().is_empty() {
            break;
        }
        trace!(header = %line.trim(), "native transport response header");
    }

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let open = Arc::new(AtomicBool::new(true));
    let flag = open.clone();
    let task = tokio::spawn(async move {
        if event_tx.send(TransportEvent::Open).await.is_ok() {
            pump_lines(reader, &event_tx, &flag).await;
        }
        flag.store(false, Ordering::SeqCst);
    });

    Ok(TransportHandle {
        events: event_rx,
        open,
        task,
    })
}

/// Read protocol lines off the socket until EOF or error
async fn pump_lines<R: tokio::io::AsyncBufRead + Unpin>(
    mut reader: R,
    event_tx: &mpsc::Sender<TransportEvent>,
    open: &AtomicBool,
) {
    loop {
        let mut line = String::new();
        match read_line_limited(&mut reader, &mut line, MAX_BODY_LINE).await {
            Ok(0) => {
                open.store(false, Ordering::SeqCst);
                let _ = event_tx.send(TransportEvent::Closed).await;
                return;
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(&['\r', '\n'][..]).to_string();
                if event_tx.send(TransportEvent::Line(trimmed)).await.is_err() {
                    // Driver dropped the handle
                    return;
                }
            }
            Err(e) => {
                open.store(false, Ordering::SeqCst);
                let _ = event_tx.send(TransportEvent::Failed(Error::Io(e))).await;
                return;
            }
        }
    }
}

/// Connect directly to host:port
async fn connect_direct(host: &str, port: u16) -> Result<tokio::net::TcpStream, Error> {
    let dest_str = format!("{}:{}", host, port);
    let dest_addr: SocketAddr = tokio::net::lookup_host(&dest_str)
        .await
        .map_err(|e| Error::ConnectFailed(format!("DNS lookup failed: {}", e)))?
        .next()
        .ok_or_else(|| Error::ConnectFailed(format!("no addresses found for {}", host)))?;

    let socket = if dest_addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| Error::ConnectFailed(format!("failed to create socket: {}", e)))?;

    socket
        .connect(dest_addr)
        .await
        .map_err(|e| Error::ConnectFailed(format!("TCP connect to {} failed: {}", dest_addr, e)))
}

/// Set TCP options for a long-lived push connection
fn set_tcp_options(stream: &tokio::net::TcpStream) {
    let sock2 = socket2::SockRef::from(stream);

    // Disable Nagle's algorithm
    let _ = sock2.set_nodelay(true);

    // Keepalive to detect dead connections below the heartbeat interval
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(30))
        .with_interval(Duration::from_secs(10));
    let _ = sock2.set_tcp_keepalive(&keepalive);
}

// ---------------------------------------------------------------------------
// Fallback transport
// ---------------------------------------------------------------------------

/// Streaming HTTP request with custom headers.
///
/// Used whenever the caller supplies request headers (auth tokens and the
/// like), which the native primitive cannot carry. Reads the response body
/// incrementally and reassembles protocol lines across chunk boundaries.
pub(crate) struct FallbackTransport {
    headers: HeaderMap,
    connect_timeout: Duration,
}

impl FallbackTransport {
    pub(crate) fn new(headers: HeaderMap, connect_timeout: Duration) -> Self {
        Self {
            headers,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn connect(&self, url: Url) -> Result<TransportHandle, Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| Error::ConnectFailed(format!("failed to build HTTP client: {}", e)))?;

        let mut headers = self.headers.clone();
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-cache"),
        );

        debug!(%url, header_count = headers.len(), "fallback transport connecting");

        let response = client.get(url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::InvalidStatus(status.as_u16()));
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));
        let flag = open.clone();
        let body = Box::pin(response.bytes_stream());
        let task = tokio::spawn(async move {
            if event_tx.send(TransportEvent::Open).await.is_ok() {
                pump_chunks(body, &event_tx).await;
            }
            flag.store(false, Ordering::SeqCst);
        });

        Ok(TransportHandle {
            events: event_rx,
            open,
            task,
        })
    }
}

/// Decode the streamed body into lines, buffering partials across chunks
async fn pump_chunks<S>(mut body: S, event_tx: &mpsc::Sender<TransportEvent>)
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    let mut buffer = BytesMut::new();
    let mut bytes_seen: usize = 0;

    loop {
        match body.next().await {
            Some(Ok(chunk)) => {
                bytes_seen += chunk.len();
                buffer.extend_from_slice(&chunk);
                for line in drain_complete_lines(&mut buffer) {
                    if event_tx.send(TransportEvent::Line(line)).await.is_err() {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "fallback transport stream error");
                let _ = event_tx.send(TransportEvent::Failed(Error::Http(e))).await;
                return;
            }
            None => {
                if bytes_seen == 0 {
                    let _ = event_tx.send(TransportEvent::Failed(Error::EmptyBody)).await;
                } else {
                    let _ = event_tx.send(TransportEvent::Closed).await;
                }
                return;
            }
        }
    }
}

/// Split off every complete line in the buffer.
///
/// A line is complete only at a newline boundary; a trailing partial stays
/// buffered for the next chunk.
fn drain_complete_lines(buffer: &mut BytesMut) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line = buffer.split_to(pos + 1);
        let mut end = line.len() - 1;
        if end > 0 && line[end - 1] == b'\r' {
            end -= 1;
        }
        lines.push(String::from_utf8_lossy(&line[..end]).into_owned());
    }
    lines
}

// ---------------------------------------------------------------------------
// Response parsing helpers
// ---------------------------------------------------------------------------

/// Parse an HTTP status line and extract the status code.
///
/// Expects "HTTP/1.x STATUS_CODE [REASON_PHRASE]"; returns None otherwise.
fn parse_http_status_line(line: &str) -> Option<u16> {
    let line = line.trim();
    let mut parts = line.split_whitespace();

    let version = parts.next()?;
    let version_suffix = version.strip_prefix("HTTP/1.")?;
    if version_suffix != "0" && version_suffix != "1" {
        return None;
    }

    let status_code: u16 = parts.next()?.parse().ok()?;
    if !(100..=599).contains(&status_code) {
        return None;
    }

    Some(status_code)
}

/// Read a line with a maximum length limit.
///
/// Returns the number of bytes read; 0 means EOF. Errors if the line
/// exceeds the limit, preventing memory exhaustion from malformed streams.
async fn read_line_limited<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut String,
    max_length: usize,
) -> std::io::Result<usize> {
    use tokio::io::AsyncBufReadExt;

    let mut total_read = 0;

    loop {
        let available = reader.fill_buf().await?;

        if available.is_empty() {
            return Ok(total_read);
        }

        let newline_pos = available.iter().position(|&b| b == b'\n');
        let (to_consume, done) = match newline_pos {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        if total_read + to_consume > max_length {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line exceeds maximum length of {} bytes", max_length),
            ));
        }

        let chunk = &available[..to_consume];
        buf.push_str(&String::from_utf8_lossy(chunk));
        total_read += to_consume;

        reader.consume(to_consume);

        if done {
            return Ok(total_read);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_parse_http_status_line_valid() {
        assert_eq!(parse_http_status_line("HTTP/1.1 200 OK\r\n"), Some(200));
        assert_eq!(parse_http_status_line("HTTP/1.0 200 OK\r\n"), Some(200));
        assert_eq!(parse_http_status_line("HTTP/1.1 200\r\n"), Some(200));
        assert_eq!(
            parse_http_status_line("HTTP/1.1 502 Bad Gateway\r\n"),
            Some(502)
        );
    }

    #[test]
    fn test_parse_http_status_line_invalid() {
        assert_eq!(parse_http_status_line("HTTP/2.0 200 OK\r\n"), None);
        assert_eq!(parse_http_status_line("200 OK\r\n"), None);
        assert_eq!(parse_http_status_line("HTTP/1.1 2xx OK\r\n"), None);
        assert_eq!(parse_http_status_line("HTTP/1.1 600 Too High\r\n"), None);
        assert_eq!(parse_http_status_line(""), None);
        assert_eq!(parse_http_status_line("Error 200 not found"), None);
    }

    #[tokio::test]
    async fn test_read_line_limited_normal() {
        let data = b"HTTP/1.1 200 OK\r\nHeader: value\r\n";
        let mut reader = BufReader::new(&data[..]);
        let mut buf = String::new();

        let bytes = read_line_limited(&mut reader, &mut buf, 1024).await.unwrap();
        assert_eq!(bytes, 17);
        assert_eq!(buf, "HTTP/1.1 200 OK\r\n");
    }

    #[tokio::test]
    async fn test_read_line_limited_exceeds_limit() {
        let data = b"This line is much longer than the tiny limit\r\n";
        let mut reader = BufReader::new(&data[..]);
        let mut buf = String::new();

        let result = read_line_limited(&mut reader, &mut buf, 10).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_line_limited_eof() {
        let data = b"no newline";
        let mut reader = BufReader::new(&data[..]);
        let mut buf = String::new();

        let bytes = read_line_limited(&mut reader, &mut buf, 1024).await.unwrap();
        assert_eq!(bytes, 10);
        assert_eq!(buf, "no newline");
    }

    #[test]
    fn test_drain_complete_lines_across_chunks() {
        let mut buffer = BytesMut::new();

        buffer.extend_from_slice(b"data: hel");
        assert!(drain_complete_lines(&mut buffer).is_empty());

        buffer.extend_from_slice(b"lo\r\ndata: world\npartial");
        let lines = drain_complete_lines(&mut buffer);
        assert_eq!(lines, vec!["data: hello", "data: world"]);

        // Partial stays buffered until its newline arrives
        buffer.extend_from_slice(b"\n");
        assert_eq!(drain_complete_lines(&mut buffer), vec!["partial"]);
    }

    #[test]
    fn test_drain_complete_lines_blank_lines() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(b"\r\n\n");
        assert_eq!(drain_complete_lines(&mut buffer), vec!["", ""]);
    }

    #[test]
    fn test_transport_selection() {
        let no_headers = HeaderMap::new();
        assert_eq!(
            select_transport(&no_headers, Duration::from_secs(1)).name(),
            "native"
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer x"),
        );
        assert_eq!(
            select_transport(&headers, Duration::from_secs(1)).name(),
            "fallback"
        );
    }

    /// Serve one scripted HTTP response on a loopback listener
    async fn spawn_one_shot_server(response: &'static [u8]) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            // Read the request up to the blank line before answering
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.expect("read request");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            socket.write_all(response).await.expect("write response");
            socket.shutdown().await.ok();
        });
        addr
    }

    #[tokio::test]
    async fn test_native_transport_streams_lines() {
        let addr = spawn_one_shot_server(
            b"HTTP/1.0 200 OK\r\nContent-Type: text/event-stream\r\n\r\nid: 1\r\ndata: hello\r\n",
        )
        .await;

        let url = Url::parse(&format!("http://{}/stream", addr)).expect("url");
        let mut handle = timeout(TEST_TIMEOUT, NativeTransport.connect(url))
            .await
            .expect("no timeout")
            .expect("connect");

        assert!(matches!(
            timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap(),
            Some(TransportEvent::Open)
        ));
        match timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap() {
            Some(TransportEvent::Line(line)) => assert_eq!(line, "id: 1"),
            other => panic!("expected line, got {:?}", other),
        }
        match timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap() {
            Some(TransportEvent::Line(line)) => assert_eq!(line, "data: hello"),
            other => panic!("expected line, got {:?}", other),
        }
        assert!(matches!(
            timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap(),
            Some(TransportEvent::Closed)
        ));
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_native_transport_rejects_error_status() {
        let addr =
            spawn_one_shot_server(b"HTTP/1.0 500 Internal Server Error\r\n\r\n").await;

        let url = Url::parse(&format!("http://{}/stream", addr)).expect("url");
        let result = timeout(TEST_TIMEOUT, NativeTransport.connect(url))
            .await
            .expect("no timeout");

        match result {
            Err(Error::InvalidStatus(500)) => {}
            other => panic!("expected InvalidStatus(500), got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fallback_transport_streams_lines() {
        let addr = spawn_one_shot_server(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\ndata: a\ndata: b\n",
        )
        .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer x"),
        );
        let transport = FallbackTransport::new(headers, Duration::from_secs(2));

        let url = Url::parse(&format!("http://{}/stream", addr)).expect("url");
        let mut handle = timeout(TEST_TIMEOUT, transport.connect(url))
            .await
            .expect("no timeout")
            .expect("connect");

        assert!(matches!(
            timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap(),
            Some(TransportEvent::Open)
        ));
        match timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap() {
            Some(TransportEvent::Line(line)) => assert_eq!(line, "data: a"),
            other => panic!("expected line, got {:?}", other),
        }
        match timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap() {
            Some(TransportEvent::Line(line)) => assert_eq!(line, "data: b"),
            other => panic!("expected line, got {:?}", other),
        }
        assert!(matches!(
            timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap(),
            Some(TransportEvent::Closed)
        ));
    }

    #[tokio::test]
    async fn test_fallback_transport_rejects_error_status() {
        let addr = spawn_one_shot_server(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
        )
        .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer x"),
        );
        let transport = FallbackTransport::new(headers, Duration::from_secs(2));

        let url = Url::parse(&format!("http://{}/stream", addr)).expect("url");
        let result = timeout(TEST_TIMEOUT, transport.connect(url))
            .await
            .expect("no timeout");

        match result {
            Err(Error::InvalidStatus(500)) => {}
            other => panic!("expected InvalidStatus(500), got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fallback_transport_empty_body_is_an_error() {
        let addr =
            spawn_one_shot_server(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer x"),
        );
        let transport = FallbackTransport::new(headers, Duration::from_secs(2));

        let url = Url::parse(&format!("http://{}/stream", addr)).expect("url");
        let mut handle = timeout(TEST_TIMEOUT, transport.connect(url))
            .await
            .expect("no timeout")
            .expect("connect");

        assert!(matches!(
            timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap(),
            Some(TransportEvent::Open)
        ));
        match timeout(TEST_TIMEOUT, handle.next_event()).await.unwrap() {
            Some(TransportEvent::Failed(Error::EmptyBody)) => {}
            other => panic!("expected EmptyBody failure, got {:?}", other),
        }
    }
}
