//! WebSocket transport and connection task.
//!
//! A [`Transport`] owns exactly one device's socket lifecycle: dialing,
//! heartbeat, reconnect backoff, and sending. It spawns a tokio task that
//! runs the connection state machine; the public handle only posts commands
//! to that task.
//!
//! # Task Loop
//!
//! ```text
//! halted ──connect()──▶ dialing ──ok──▶ online ──loss──▶ backoff ──┐
//!   ▲                      ▲  └─fail─▶ backoff ─┘                  │
//!   │                      └────────────── retry ◀─────────────────┘
//!   └── disconnect() from any mode (intentional close, no reconnect)
//! ```
//!
//! Unexpected socket loss reconnects with exponential backoff; an
//! intentional `disconnect()` halts until the next `connect()`. Exhausting
//! the retry budget (or a malformed address) parks the transport in the
//! `Error` state, which `connect()`/`immediate_reconnect()` can revive when
//! the network returns.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use futures_util::stream::SplitSink;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::identifiers::DeviceId;

use super::backoff::Backoff;
use super::heartbeat::Heartbeat;

// ============================================================================
// Types
// ============================================================================

/// Client-side WebSocket stream type.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel on which transports emit events tagged with their device ID.
pub type EventSender = mpsc::UnboundedSender<(DeviceId, TransportEvent)>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, never asked to connect.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// The socket is open and usable.
    Connected,
    /// Connection lost; a backoff timer is outstanding.
    Reconnecting,
    /// Intentionally closed; no reconnect until the next `connect()`.
    Disconnected,
    /// Terminal failure: retries exhausted or the address is malformed.
    Error,
}

impl ConnectionState {
    /// Returns the lowercase state name used in logs and UI payloads.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ConnectionChange
// ============================================================================

/// Payload of a connection-state change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionChange {
    /// The state just entered.
    pub state: ConnectionState,

    /// Whether any frame has been received on the current connection.
    pub has_data: bool,

    /// Whether this device has ever connected before this event.
    ///
    /// Sticky across reconnects; distinguishes "first connect" from
    /// "reconnect" for UI messaging.
    pub has_connected_before: bool,
}

// ============================================================================
// TransportEvent
// ============================================================================

/// One event emitted by a transport toward the connection manager.
#[derive(Debug)]
pub enum TransportEvent {
    /// The transport entered a new lifecycle state.
    ConnectionChange(ConnectionChange),

    /// A raw text frame arrived from the device.
    Message(String),

    /// A transport-level error occurred (recovered internally).
    Error(Error),
}

// ============================================================================
// TransportCommand
// ============================================================================

/// Commands posted from the public handle to the connection task.
enum TransportCommand {
    /// Begin dialing (no-op while connecting or connected).
    Connect,
    /// Close intentionally; do not reconnect.
    Disconnect,
    /// Write one text frame to the socket.
    Send(String),
    /// Suspend the keep-alive without closing the socket.
    PauseHeartbeat,
    /// Resume the keep-alive.
    ResumeHeartbeat,
    /// Cancel any pending backoff and retry now.
    ImmediateReconnect,
    /// Tear down permanently.
    Destroy,
}

// ============================================================================
// Transport
// ============================================================================

/// Handle to one device's connection task.
///
/// Cloning shares the same underlying task; all operations are non-blocking
/// posts to it. Exclusively owned by the connection manager.
pub struct Transport {
    /// Channel into the connection task.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    /// State shared with the task.
    shared: Arc<TransportShared>,
}

impl Clone for Transport {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("device_id", &self.shared.device_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport and spawns its connection task.
    ///
    /// Does not dial; call [`Transport::connect`] to start.
    pub(crate) fn spawn(
        device_id: DeviceId,
        address: String,
        config: ConnectionConfig,
        events: EventSender,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(TransportShared {
            device_id,
            address,
            config,
            state: Mutex::new(ConnectionState::Idle),
            has_ever_connected: AtomicBool::new(false),
            has_data: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            events,
        });

        tokio::spawn(run_task(Arc::clone(&shared), command_rx));

        Self { command_tx, shared }
    }

    /// Returns the device this transport belongs to.
    #[inline]
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.shared.device_id
    }

    /// Returns the device address this transport dials.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Returns `true` iff the transport is in the `Connected` state.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns `true` once the transport has connected at least once.
    ///
    /// Sticky; never resets.
    #[inline]
    #[must_use]
    pub fn has_ever_connected(&self) -> bool {
        self.shared.has_ever_connected.load(Ordering::SeqCst)
    }

    /// Begins dialing the device.
    ///
    /// No-op while already connecting or connected; from the `Reconnecting`
    /// or `Error` states it retries immediately.
    pub fn connect(&self) {
        self.post(TransportCommand::Connect);
    }

    /// Closes the connection intentionally.
    ///
    /// Does not trigger reconnect; the transport stays `Disconnected` until
    /// the next [`Transport::connect`].
    pub fn disconnect(&self) {
        self.post(TransportCommand::Disconnect);
    }

    /// Writes one text frame to the socket.
    ///
    /// Side effect only; response correlation is layered above.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] unless the state is `Connected`.
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        if self.shared.destroyed.load(Ordering::SeqCst) || !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.command_tx
            .send(TransportCommand::Send(payload.into()))
            .map_err(|_| Error::NotConnected)
    }

    /// Suspends the keep-alive without closing the socket.
    ///
    /// Used on app backgrounding. Idempotent.
    pub fn pause_heartbeat(&self) {
        self.post(TransportCommand::PauseHeartbeat);
    }

    /// Resumes the keep-alive. Idempotent.
    pub fn resume_heartbeat(&self) {
        self.post(TransportCommand::ResumeHeartbeat);
    }

    /// Cancels any pending backoff timer and retries immediately.
    ///
    /// Used when the network interface signals it just came back up. No-op
    /// while already connected.
    pub fn immediate_reconnect(&self) {
        self.post(TransportCommand::ImmediateReconnect);
    }

    /// Tears the transport down permanently.
    ///
    /// Closes the socket, stops all timers, and makes every subsequent
    /// operation fail or no-op.
    pub fn destroy(&self) {
        self.shared.destroyed.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(TransportCommand::Destroy);
    }

    /// Posts a command unless the transport was destroyed.
    fn post(&self, command: TransportCommand) {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.command_tx.send(command);
    }
}

// ============================================================================
// TransportShared
// ============================================================================

/// State shared between the handle and the connection task.
struct TransportShared {
    /// Device this transport belongs to.
    device_id: DeviceId,
    /// Address dialed on every attempt.
    address: String,
    /// Tuning values.
    config: ConnectionConfig,
    /// Current lifecycle state.
    state: Mutex<ConnectionState>,
    /// Sticky "has connected at least once" flag.
    has_ever_connected: AtomicBool,
    /// Whether any frame arrived on the current connection.
    has_data: AtomicBool,
    /// Set by `destroy()`; gates the public handle.
    destroyed: AtomicBool,
    /// Event channel into the connection manager.
    events: EventSender,
}

impl TransportShared {
    /// Enters `next` and emits a connection-change event if it differs.
    ///
    /// `has_connected_before` is captured before the sticky flag is updated,
    /// so the first `Connected` event reports `false`.
    fn transition(&self, next: ConnectionState) {
        {
            let mut state = self.state.lock();
            if *state == next {
                return;
            }
            *state = next;
        }

        let change = ConnectionChange {
            state: next,
            has_data: self.has_data.load(Ordering::SeqCst),
            has_connected_before: self.has_ever_connected.load(Ordering::SeqCst),
        };
        if next == ConnectionState::Connected {
            self.has_ever_connected.store(true, Ordering::SeqCst);
        }

        debug!(device_id = %self.device_id, state = %next, "connection state changed");
        self.emit(TransportEvent::ConnectionChange(change));
    }

    /// Emits one event tagged with this transport's device ID.
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send((self.device_id.clone(), event));
    }
}

// ============================================================================
// Address Normalization
// ============================================================================

/// Normalizes a device address into a WebSocket URL.
///
/// Bare `host:port` addresses become `ws://host:port`; explicit `ws`/`wss`
/// URLs pass through.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] for unparsable addresses or non-ws
/// schemes. This is terminal: the transport parks in the `Error` state.
fn normalize_address(address: &str) -> Result<Url> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("ws://{address}")
    };

    let url = Url::parse(&candidate).map_err(|_| Error::invalid_address(address))?;
    if !matches!(url.scheme(), "ws" | "wss") || url.host_str().is_none() {
        return Err(Error::invalid_address(address));
    }
    Ok(url)
}

// ============================================================================
// Connection Task
// ============================================================================

/// Outcome of one online session.
enum OnlineExit {
    /// Unexpected loss; reconnect with backoff.
    Lost,
    /// Intentional disconnect; halt until the next connect.
    Halted,
    /// Transport destroyed; terminate the task.
    Destroyed,
}

/// Outcome of one backoff wait.
enum RetryExit {
    /// Timer elapsed or immediate reconnect requested.
    Retry,
    /// Intentional disconnect; halt until the next connect.
    Halted,
    /// Transport destroyed; terminate the task.
    Destroyed,
}

/// Connection state machine, one task per transport.
async fn run_task(
    shared: Arc<TransportShared>,
    mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
) {
    let mut backoff = Backoff::new(&shared.config);
    let mut hb_paused = false;

    'task: loop {
        // ---- halted: wait for a command that starts dialing
        loop {
            let Some(command) = command_rx.recv().await else {
                break 'task;
            };
            match command {
                TransportCommand::Connect | TransportCommand::ImmediateReconnect => break,
                TransportCommand::Disconnect => {}
                TransportCommand::Send(_) => {
                    trace!(device_id = %shared.device_id, "send while halted dropped");
                }
                TransportCommand::PauseHeartbeat => hb_paused = true,
                TransportCommand::ResumeHeartbeat => hb_paused = false,
                TransportCommand::Destroy => break 'task,
            }
        }

        backoff.reset();

        // ---- dial / online / backoff cycle
        'dial: loop {
            shared.transition(ConnectionState::Connecting);

            let url = match normalize_address(&shared.address) {
                Ok(url) => url,
                Err(e) => {
                    warn!(device_id = %shared.device_id, error = %e, "address rejected");
                    shared.emit(TransportEvent::Error(e));
                    shared.transition(ConnectionState::Error);
                    continue 'task;
                }
            };

            match timeout(shared.config.connect_timeout, connect_async(url.as_str())).await {
                Ok(Ok((ws_stream, _response))) => {
                    backoff.reset();
                    shared.has_data.store(false, Ordering::SeqCst);
                    shared.transition(ConnectionState::Connected);

                    match run_online(&shared, ws_stream, &mut command_rx, &mut hb_paused).await {
                        OnlineExit::Lost => {}
                        OnlineExit::Halted => {
                            shared.transition(ConnectionState::Disconnected);
                            continue 'task;
                        }
                        OnlineExit::Destroyed => break 'task,
                    }
                }
                Ok(Err(e)) => {
                    shared.emit(TransportEvent::Error(Error::connection(e.to_string())));
                }
                Err(_) => {
                    shared.emit(TransportEvent::Error(Error::connection_timeout(
                        shared.config.connect_timeout.as_millis() as u64,
                    )));
                }
            }

            // ---- backoff before the next attempt
            let budget = shared.config.max_reconnect_attempts;
            if budget > 0 && backoff.attempt() >= budget {
                warn!(
                    device_id = %shared.device_id,
                    attempts = backoff.attempt(),
                    "reconnect budget exhausted"
                );
                shared.transition(ConnectionState::Error);
                continue 'task;
            }

            shared.transition(ConnectionState::Reconnecting);
            let wake = backoff.schedule(Instant::now());
            debug!(
                device_id = %shared.device_id,
                attempt = backoff.attempt(),
                delay_ms = (wake - Instant::now()).as_millis() as u64,
                "reconnect scheduled"
            );

            match wait_for_retry(&mut backoff, wake, &mut command_rx, &mut hb_paused).await {
                RetryExit::Retry => continue 'dial,
                RetryExit::Halted => {
                    shared.transition(ConnectionState::Disconnected);
                    continue 'task;
                }
                RetryExit::Destroyed => break 'task,
            }
        }
    }

    // Destroyed or handle dropped: no events past this point.
    shared.destroyed.store(true, Ordering::SeqCst);
    *shared.state.lock() = ConnectionState::Disconnected;
    debug!(device_id = %shared.device_id, "transport task terminated");
}

/// Runs one connected session until loss, disconnect, or destroy.
async fn run_online(
    shared: &Arc<TransportShared>,
    ws_stream: WsStream,
    command_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
    hb_paused: &mut bool,
) -> OnlineExit {
    let (mut sink, mut stream) = ws_stream.split();
    let mut heartbeat = Heartbeat::new(&shared.config, Instant::now());
    if *hb_paused {
        heartbeat.pause();
    }

    loop {
        let wake = heartbeat.next_wake().map(tokio::time::Instant::from_std);

        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    shared.has_data.store(true, Ordering::SeqCst);
                    heartbeat.on_ack(Instant::now());
                    trace!(device_id = %shared.device_id, "frame received");
                    shared.emit(TransportEvent::Message(text.to_string()));
                }

                Some(Ok(Message::Pong(_))) => heartbeat.on_ack(Instant::now()),

                Some(Ok(Message::Close(_))) => {
                    debug!(device_id = %shared.device_id, "socket closed by device");
                    return OnlineExit::Lost;
                }

                // Binary and Ping (answered by the protocol layer)
                Some(Ok(_)) => {}

                Some(Err(e)) => {
                    shared.emit(TransportEvent::Error(Error::connection(e.to_string())));
                    return OnlineExit::Lost;
                }

                None => {
                    debug!(device_id = %shared.device_id, "socket stream ended");
                    return OnlineExit::Lost;
                }
            },

            command = command_rx.recv() => match command {
                Some(TransportCommand::Send(payload)) => {
                    if let Err(e) = sink.send(Message::Text(payload.into())).await {
                        shared.emit(TransportEvent::Error(Error::connection(e.to_string())));
                        return OnlineExit::Lost;
                    }
                }

                Some(TransportCommand::Disconnect) => {
                    close_sink(&mut sink).await;
                    return OnlineExit::Halted;
                }

                // Already connected; commutative-safe no-ops.
                Some(TransportCommand::Connect | TransportCommand::ImmediateReconnect) => {}

                Some(TransportCommand::PauseHeartbeat) => {
                    *hb_paused = true;
                    heartbeat.pause();
                }

                Some(TransportCommand::ResumeHeartbeat) => {
                    *hb_paused = false;
                    heartbeat.resume(Instant::now());
                }

                Some(TransportCommand::Destroy) | None => {
                    close_sink(&mut sink).await;
                    return OnlineExit::Destroyed;
                }
            },

            () = sleep_until_opt(wake) => {
                let now = Instant::now();
                if heartbeat.is_overdue(now) {
                    shared.emit(TransportEvent::Error(Error::connection(
                        "heartbeat ack timed out",
                    )));
                    return OnlineExit::Lost;
                }
                if heartbeat.ping_due(now) {
                    if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                        shared.emit(TransportEvent::Error(Error::connection(e.to_string())));
                        return OnlineExit::Lost;
                    }
                    heartbeat.on_ping_sent(Instant::now());
                }
            }
        }
    }
}

/// Sleeps out a backoff window while staying responsive to commands.
async fn wait_for_retry(
    backoff: &mut Backoff,
    wake: Instant,
    command_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
    hb_paused: &mut bool,
) -> RetryExit {
    let deadline = tokio::time::Instant::from_std(wake);
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return RetryExit::Retry,

            command = command_rx.recv() => match command {
                Some(TransportCommand::Connect | TransportCommand::ImmediateReconnect) => {
                    backoff.cancel_wake();
                    return RetryExit::Retry;
                }
                Some(TransportCommand::Disconnect) => return RetryExit::Halted,
                Some(TransportCommand::Send(_)) => {
                    trace!("send while reconnecting dropped");
                }
                Some(TransportCommand::PauseHeartbeat) => *hb_paused = true,
                Some(TransportCommand::ResumeHeartbeat) => *hb_paused = false,
                Some(TransportCommand::Destroy) | None => return RetryExit::Destroyed,
            }
        }
    }
}

/// Sends a close frame and shuts the sink, ignoring write errors.
async fn close_sink(sink: &mut SplitSink<WsStream, Message>) {
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

/// Sleeps until `deadline`, or forever when no wake is scheduled.
async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
