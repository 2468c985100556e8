use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::config::{ConfigError, StreamConfig};
use crate::dispatch::MessageBuffer;
use crate::error::Error;
use crate::handler::{StreamContext, StreamHandler};
use crate::heartbeat::HeartbeatMonitor;
use crate::parser::{MessageRecord, StreamParser};
use crate::session::StreamSession;
use crate::stats::{ConnectionStats, StatsSnapshot};
use crate::transport::{select_transport, Transport, TransportEvent, TransportHandle};

/// Countdown refresh cadence during a reconnect wait
const COUNTDOWN_TICK: Duration = Duration::from_millis(100);

/// Capacity of the control command channel
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Observable connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a connection
    Connecting,
    /// Actively receiving the stream
    Connected,
    /// Not connected and not trying; reached by `close()` or exhaustion
    Disconnected,
    /// A transport failure was just observed
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Commands sent from the client facade to the driver task
#[derive(Debug)]
enum Command {
    /// Shut everything down
    Close,
    /// Cancel any backoff wait, reset the attempt counter, connect now
    Reconnect,
}

/// How the connected event loop ended
enum LoopEnd {
    /// Close command or client dropped
    Close,
    /// Manual reconnect command
    ManualReconnect,
    /// Transport failure, heartbeat staleness included
    Failure(Error),
}

/// What the failure path decided
enum Next {
    Retry,
    Shutdown,
}

/// Resilient streaming client over a one-directional push stream.
///
/// Owns the connection state machine: it selects a transport strategy at
/// construction, reconnects with exponential backoff on failure, watches
/// liveness with a heartbeat, and holds records arriving around a
/// reconnection so the consumer always sees them in wire order.
///
/// One instance manages one logical stream. All work happens on a single
/// spawned driver task; the facade only exchanges commands and snapshots
/// with it, so every method is safe to call from any task.
pub struct StreamClient<H: StreamHandler> {
    handler: Arc<H>,
    stats: Arc<ConnectionStats>,
    state_rx: watch::Receiver<ConnectionState>,
    countdown_rx: watch::Receiver<u64>,
    cmd_tx: mpsc::Sender<Command>,
    driver: Mutex<Option<JoinHandle<()>>>,
    stream_id: String,
}

impl<H: StreamHandler> StreamClient<H> {
    /// Open a stream: validate the configuration, select the transport
    /// strategy, and start connecting.
    ///
    /// The fallback transport is selected when `config.headers` is
    /// non-empty, the native transport otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse; transport failures are
    /// never returned here, they surface through the handler callbacks.
    pub fn open(config: StreamConfig, handler: H) -> Result<Self, ConfigError> {
        let url = Url::parse(&config.url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

        let handler = Arc::new(handler);
        let stats = Arc::new(ConnectionStats::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (countdown_tx, countdown_rx) = watch::channel(0u64);

        let session = StreamSession::new(url, config.headers.clone());
        let stream_id = session.stream_id.clone();
        let transport = select_transport(&config.headers, config.connect_timeout);

        info!(
            stream_id = %stream_id,
            url = %config.url,
            transport = transport.name(),
            "opening stream"
        );

        let driver = Driver {
            config,
            handler: Arc::clone(&handler),
            session,
            transport,
            stats: Arc::clone(&stats),
            state_tx,
            countdown_tx,
            cmd_rx,
            parser: StreamParser::new(),
            buffer: MessageBuffer::new(),
        };
        let handle = tokio::spawn(driver.run());

        Ok(Self {
            handler,
            stats,
            state_rx,
            countdown_rx,
            cmd_tx,
            driver: Mutex::new(Some(handle)),
            stream_id,
        })
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Whole seconds until the next reconnection attempt, 0 when idle
    pub fn reconnect_countdown(&self) -> u64 {
        *self.countdown_rx.borrow()
    }

    /// Subscribe to reconnect countdown updates
    pub fn countdown_watch(&self) -> watch::Receiver<u64> {
        self.countdown_rx.clone()
    }

    /// Point-in-time copy of the connection statistics
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Identifier of this logical stream, constant across reconnections
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Get a reference to the handler
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Close the stream: abort any in-flight connection attempt, cancel all
    /// timers, and transition to `Disconnected`.
    ///
    /// Waits for the driver task to exit, so once this returns no further
    /// handler callback will fire. Safe to call multiple times; later calls
    /// are no-ops.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Manually reconnect: cancel any backoff wait, reset the attempt
    /// counter, and connect immediately.
    ///
    /// This is also the only way to resume after automatic reconnection
    /// gave up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once the client has been closed.
    pub async fn reconnect(&self) -> Result<(), Error> {
        self.cmd_tx
            .send(Command::Reconnect)
            .await
            .map_err(|_| Error::Closed)
    }
}

impl<H: StreamHandler> Drop for StreamClient<H> {
    fn drop(&mut self) {
        // Abort the driver to avoid an orphaned task
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

/// The long-lived task owning session state and the connection loop
struct Driver<H: StreamHandler> {
    config: StreamConfig,
    handler: Arc<H>,
    session: StreamSession,
    transport: Box<dyn Transport>,
    stats: Arc<ConnectionStats>,
    state_tx: watch::Sender<ConnectionState>,
    countdown_tx: watch::Sender<u64>,
    cmd_rx: mpsc::Receiver<Command>,
    parser: StreamParser,
    buffer: MessageBuffer,
}

impl<H: StreamHandler> Driver<H> {
    async fn run(mut self) {
        let mut attempts: u32 = 0;
        let mut is_reconnect = false;

        loop {
            self.set_state(ConnectionState::Connecting);
            self.stats.record_attempt();
            let ctx = self.context(is_reconnect, attempts);

            let url = self.session.resume_url();
            debug!(stream_id = %self.session.stream_id, %url, attempt = attempts, "connecting");

            // Stay responsive to close/reconnect while the connect is in
            // flight; a command drops the attempt on the floor.
            let connect =
                tokio::time::timeout(self.config.connect_timeout, self.transport.connect(url));
            let result = tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Reconnect) => {
                            attempts = 0;
                            continue;
                        }
                        Some(Command::Close) | None => {
                            self.finish_close(false);
                            return;
                        }
                    }
                }
                result = connect => result,
            };

            let handle = match result {
                Ok(Ok(handle)) => handle,
                Ok(Err(e)) => {
                    match self.handle_failure(e, &mut attempts, &ctx).await {
                        Next::Retry => {
                            is_reconnect = true;
                            continue;
                        }
                        Next::Shutdown => return,
                    }
                }
                Err(_) => {
                    let e = Error::ConnectFailed("connection timeout".to_string());
                    match self.handle_failure(e, &mut attempts, &ctx).await {
                        Next::Retry => {
                            is_reconnect = true;
                            continue;
                        }
                        Next::Shutdown => return,
                    }
                }
            };

            // Connected
            info!(
                stream_id = %self.session.stream_id,
                transport = self.transport.name(),
                reconnect = is_reconnect,
                "connected"
            );
            self.stats.record_connected(is_reconnect);
            attempts = 0;
            let ctx = self.context(is_reconnect, 0);
            self.set_state(ConnectionState::Connected);
            self.handler.on_connect(&ctx).await;
            self.flush_buffer(&ctx).await;

            let outcome = self.run_connected(handle, &ctx).await;

            match outcome {
                LoopEnd::Close => {
                    self.finish_close(true);
                    return;
                }
                LoopEnd::ManualReconnect => {
                    info!(stream_id = %self.session.stream_id, "manual reconnect requested");
                    self.stats.record_disconnected(None);
                    attempts = 0;
                    is_reconnect = true;
                }
                LoopEnd::Failure(e) => {
                    is_reconnect = true;
                    match self.handle_failure(e, &mut attempts, &ctx).await {
                        Next::Retry => {}
                        Next::Shutdown => return,
                    }
                }
            }
        }
    }

    /// Event loop for one live connection. Tears the handle down completely
    /// before returning, so the next attempt never overlaps it.
    async fn run_connected(&mut self, mut handle: TransportHandle, ctx: &StreamContext) -> LoopEnd {
        let mut monitor = HeartbeatMonitor::new(self.config.heartbeat.clone());
        let heartbeat_period = self.config.heartbeat.interval;
        let mut heartbeat = interval_at(Instant::now() + heartbeat_period, heartbeat_period);

        let outcome = loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Close) | None => break LoopEnd::Close,
                        Some(Command::Reconnect) => break LoopEnd::ManualReconnect,
                    }
                }

                event = handle.next_event() => {
                    match event {
                        Some(TransportEvent::Open) => {
                            trace!("transport reported open");
                        }
                        Some(TransportEvent::Line(line)) => {
                            monitor.record_data_received();
                            self.process_line(&line, ctx).await;
                        }
                        Some(TransportEvent::Failed(e)) => break LoopEnd::Failure(e),
                        Some(TransportEvent::Closed) | None => {
                            break LoopEnd::Failure(Error::StreamEnded)
                        }
                    }
                }

                _ = heartbeat.tick() => {
                    if let Some(reason) = monitor.check(handle.is_open()) {
                        warn!(
                            stream_id = %self.session.stream_id,
                            %reason,
                            "heartbeat declared connection stale"
                        );
                        break LoopEnd::Failure(Error::HeartbeatStale);
                    }
                }
            }
        };

        // Leave the connected state first so salvaged records are held, not
        // delivered, then pull whatever the pump already queued.
        match &outcome {
            LoopEnd::Failure(_) => {
                self.set_state(ConnectionState::Error);
                self.salvage_queued_lines(&mut handle, ctx).await;
            }
            LoopEnd::ManualReconnect => {
                self.set_state(ConnectionState::Connecting);
                self.salvage_queued_lines(&mut handle, ctx).await;
            }
            LoopEnd::Close => {}
        }

        handle.shutdown().await;
        outcome
    }

    /// Move lines the pump queued before the teardown into the reconnection
    /// buffer, preserving wire order.
    async fn salvage_queued_lines(&mut self, handle: &mut TransportHandle, ctx: &StreamContext) {
        while let Some(event) = handle.try_next_event() {
            if let TransportEvent::Line(line) = event {
                self.process_line(&line, ctx).await;
            }
        }
        if !self.buffer.is_empty() {
            debug!(
                held = self.buffer.len(),
                "holding records until reconnection completes"
            );
        }
    }

    /// Parse one raw line and dispatch or buffer the resulting record
    async fn process_line(&mut self, line: &str, ctx: &StreamContext) {
        trace!(line, "line received");
        let handler = &self.handler;
        let record = self.parser.parse_line(line, &mut self.session.last_event_id, |t| {
            handler.handles_event(t)
        });
        if let Some(record) = record {
            self.dispatch(record, ctx).await;
        }
    }

    /// Deliver a record, or hold it while a reconnection is in flight
    async fn dispatch(&mut self, record: MessageRecord, ctx: &StreamContext) {
        if *self.state_tx.borrow() == ConnectionState::Connected {
            self.stats.record_delivered();
            self.handler.on_message(record, ctx).await;
        } else {
            self.buffer.push(record);
        }
    }

    /// Flush records held during reconnection, oldest first
    async fn flush_buffer(&mut self, ctx: &StreamContext) {
        if self.buffer.is_empty() {
            return;
        }
        let records = self.buffer.drain();
        info!(count = records.len(), "flushing records held during reconnection");
        for record in records {
            self.stats.record_delivered();
            self.handler.on_message(record, ctx).await;
        }
    }

    /// Shared failure path: record, notify, then either schedule a retry,
    /// park after exhaustion, or shut down on command.
    async fn handle_failure(
        &mut self,
        error: Error,
        attempts: &mut u32,
        ctx: &StreamContext,
    ) -> Next {
        let message = error.to_string();
        error!(
            stream_id = %self.session.stream_id,
            error = %message,
            attempt = *attempts,
            "transport error"
        );
        self.stats.record_disconnected(Some(&message));
        self.set_state(ConnectionState::Error);
        self.handler.on_error(error.kind(), &message, ctx).await;

        *attempts += 1;
        if *attempts > self.config.reconnect.max_attempts {
            warn!(
                stream_id = %self.session.stream_id,
                max_attempts = self.config.reconnect.max_attempts,
                "reconnect attempts exhausted"
            );
            self.countdown_tx.send_replace(0);
            self.set_state(ConnectionState::Disconnected);
            self.handler.on_max_reconnects(ctx).await;

            // No further timers; only a manual reconnect or close moves on
            loop {
                match self.cmd_rx.recv().await {
                    Some(Command::Reconnect) => {
                        *attempts = 0;
                        return Next::Retry;
                    }
                    Some(Command::Close) | None => {
                        self.finish_close(false);
                        return Next::Shutdown;
                    }
                }
            }
        }

        let delay = self.config.reconnect.delay_for_attempt(*attempts);
        info!(
            stream_id = %self.session.stream_id,
            attempt = *attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnecting after backoff"
        );
        self.set_state(ConnectionState::Connecting);

        match self.backoff_wait(delay).await {
            WaitOutcome::Elapsed => Next::Retry,
            WaitOutcome::ManualReconnect => {
                *attempts = 0;
                Next::Retry
            }
            WaitOutcome::Close => {
                self.finish_close(false);
                Next::Shutdown
            }
        }
    }

    /// Sleep out the backoff delay while publishing a live countdown.
    /// Interrupted immediately by close or manual reconnect.
    async fn backoff_wait(&mut self, delay: Duration) -> WaitOutcome {
        let deadline = Instant::now() + delay;
        let mut tick = tokio::time::interval(COUNTDOWN_TICK);

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    self.countdown_tx.send_replace(0);
                    return match cmd {
                        Some(Command::Reconnect) => WaitOutcome::ManualReconnect,
                        Some(Command::Close) | None => WaitOutcome::Close,
                    };
                }

                _ = tick.tick() => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.countdown_tx.send_replace(0);
                        return WaitOutcome::Elapsed;
                    }
                    let remaining = (deadline - now).as_secs_f64().ceil() as u64;
                    self.countdown_tx.send_replace(remaining);
                }
            }
        }
    }

    fn context(&self, is_reconnect: bool, attempts: u32) -> StreamContext {
        StreamContext {
            stream_id: self.session.stream_id.clone(),
            is_reconnect,
            reconnect_attempt: attempts,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = *self.state_tx.borrow();
        if previous == state {
            return;
        }
        if self.config.debug {
            info!(stream_id = %self.session.stream_id, %previous, %state, "state transition");
        } else {
            debug!(stream_id = %self.session.stream_id, %previous, %state, "state transition");
        }
        // send_replace: the value must advance even with no watcher alive
        self.state_tx.send_replace(state);
    }

    fn finish_close(&mut self, was_connected: bool) {
        if was_connected {
            self.stats.record_disconnected(None);
        }
        self.countdown_tx.send_replace(0);
        self.set_state(ConnectionState::Disconnected);
        info!(stream_id = %self.session.stream_id, "stream client closed");
    }
}

/// How a backoff wait ended
enum WaitOutcome {
    Elapsed,
    ManualReconnect,
    Close,
}
