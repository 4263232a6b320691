//! High-level client for one Core device session.
//!
//! [`CoreClient`] layers the request/response [`Correlator`] and the
//! [`NotificationRouter`] over the [`ConnectionManager`]'s active transport,
//! and exposes typed API calls for every device method.
//!
//! # Wiring
//!
//! The manager is a dumb multiplexer, so deciding which device's events
//! matter is the consumer's job. [`CoreClient::attach`] installs the
//! standard handler set: every event re-checks the active device ID at
//! consume time (it can change between emission and handling), responses
//! and notifications are routed through [`CoreClient::process_received`],
//! the offline queue is flushed on connect, and pending calls are cancelled
//! on loss.
//!
//! ```ignore
//! let manager = ConnectionManager::new(ConnectionConfig::new());
//! let client = CoreClient::new(Arc::clone(&manager));
//! client.attach();
//! client.set_notification_handler(ui_state);
//!
//! let transport = manager.add_device(DeviceConfig::websocket("192.168.1.100:7497"))?;
//! manager.set_active_device(transport.device_id())?;
//! transport.connect();
//!
//! let media = client.media().await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::correlator::Correlator;
use crate::error::{Error, Result};
use crate::manager::{ConnectionManager, EventHandlers};
use crate::protocol::{
    CoreCommand, Frame, PlayingMedia, ScannedToken, SearchResults, SystemList, TokenHistory,
    VersionInfo,
};
use crate::router::{NotificationHandler, NotificationRouter};
use crate::transport::ConnectionState;

// ============================================================================
// CoreClient
// ============================================================================

/// Session facade over the active device.
///
/// Construct once next to the [`ConnectionManager`] and share by `Arc`.
pub struct CoreClient {
    /// Device registry and event fan-out.
    manager: Arc<ConnectionManager>,

    /// Outstanding-call tracking for the active device's stream.
    correlator: Correlator,

    /// Notification decoding and dispatch.
    router: NotificationRouter,
}

// ============================================================================
// CoreClient - Construction & Wiring
// ============================================================================

impl CoreClient {
    /// Creates a client over `manager` with default tuning.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Arc<Self> {
        Self::with_config(manager, &ConnectionConfig::new())
    }

    /// Creates a client over `manager` with explicit tuning.
    #[must_use]
    pub fn with_config(manager: Arc<ConnectionManager>, config: &ConnectionConfig) -> Arc<Self> {
        Arc::new(Self {
            manager,
            correlator: Correlator::new(config),
            router: NotificationRouter::new(config),
        })
    }

    /// Returns the underlying connection manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Returns the correlator (exposed for advanced wiring and tests).
    #[inline]
    #[must_use]
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Returns the notification router.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &NotificationRouter {
        &self.router
    }

    /// Registers the application-side notification handler.
    pub fn set_notification_handler(&self, handler: Arc<dyn NotificationHandler>) {
        self.router.set_handler(handler);
    }

    /// Installs this client's standard handler set on the manager.
    ///
    /// Replaces any previously registered handlers (last-writer-wins).
    pub fn attach(self: &Arc<Self>) {
        self.manager.set_event_handlers(self.event_handlers());
    }

    /// Builds the standard manager handler set.
    ///
    /// Useful when the UI layer wants to wrap the handlers with extra
    /// behavior before registering them itself.
    #[must_use]
    pub fn event_handlers(self: &Arc<Self>) -> EventHandlers {
        let on_change = Arc::clone(self);
        let on_message = Arc::clone(self);

        EventHandlers {
            on_connection_change: Box::new(move |device_id, change| {
                // Active can change between emission and handling.
                if on_change.manager.active_device_id().as_ref() != Some(device_id) {
                    return;
                }
                match change.state {
                    ConnectionState::Connected => {
                        on_change.flush_queue();
                    }
                    ConnectionState::Reconnecting
                    | ConnectionState::Disconnected
                    | ConnectionState::Error => {
                        on_change.correlator.reject_all();
                    }
                    ConnectionState::Idle | ConnectionState::Connecting => {}
                }
            }),

            on_message: Box::new(move |device_id, text| {
                if on_message.manager.active_device_id().as_ref() != Some(device_id) {
                    return;
                }
                // Malformed frames are already reported through the router.
                let _ = on_message.process_received(text);
            }),

            on_error: Box::new(|device_id, error| {
                debug!(device_id = %device_id, error = %error, "transport error");
            }),
        }
    }
}

// ============================================================================
// CoreClient - Inbound Path
// ============================================================================

impl CoreClient {
    /// Classifies and consumes one inbound frame from the active device.
    ///
    /// A frame with a correlation ID goes to the correlator (late responses
    /// are discarded silently); a frame with a method goes to the
    /// notification router.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] for unparsable frames. The error is
    /// also reported through the rate-limited error toast; the connection
    /// stays usable.
    pub fn process_received(&self, text: &str) -> Result<()> {
        match Frame::parse(text) {
            Ok(Frame::Response(response)) => {
                self.correlator.resolve(response);
                Ok(())
            }
            Ok(Frame::Notification(frame)) => {
                self.router.route(&frame);
                Ok(())
            }
            Err(e) => {
                self.router.report_malformed(&e.to_string());
                Err(e)
            }
        }
    }

    /// Re-sends calls queued while disconnected over the active transport.
    ///
    /// Returns the number of calls flushed.
    pub fn flush_queue(&self) -> usize {
        match self.manager.active_connection() {
            Some(transport) => self.correlator.flush_queue(&transport),
            None => 0,
        }
    }

    /// Logical disconnect: synchronously rejects every pending call and
    /// clears the router's transient state.
    ///
    /// Handlers stay registered and the correlation counter is not rewound.
    pub fn reset(&self) {
        let cancelled = self.correlator.reject_all();
        self.router.reset();
        debug!(cancelled, "client reset");
    }
}

// ============================================================================
// CoreClient - API Calls
// ============================================================================

impl CoreClient {
    /// Issues a raw correlated call against the active device.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] when no device is active; otherwise the
    /// correlator's call errors.
    pub async fn call(&self, command: CoreCommand) -> Result<Value> {
        let transport = self.manager.active_connection().ok_or(Error::NotConnected)?;
        self.correlator.call(&transport, command).await
    }

    /// Queries the currently playing media.
    pub async fn media(&self) -> Result<PlayingMedia> {
        self.call_typed(CoreCommand::MediaActive).await
    }

    /// Queries the last scanned token.
    pub async fn tokens(&self) -> Result<ScannedToken> {
        self.call_typed(CoreCommand::TokensActive).await
    }

    /// Queries the scan history.
    pub async fn history(&self) -> Result<TokenHistory> {
        self.call_typed(CoreCommand::TokensHistory).await
    }

    /// Searches the device's media database.
    pub async fn search(&self, query: impl Into<String>, systems: Vec<String>) -> Result<SearchResults> {
        self.call_typed(CoreCommand::MediaSearch {
            query: query.into(),
            systems,
        })
        .await
    }

    /// Launches media as if a token with this text had been scanned.
    pub async fn launch(&self, text: impl Into<String>) -> Result<()> {
        self.call(CoreCommand::Launch { text: text.into() }).await?;
        Ok(())
    }

    /// Stops the currently running media.
    pub async fn stop(&self) -> Result<()> {
        self.call(CoreCommand::Stop).await?;
        Ok(())
    }

    /// Starts (or restarts) the media database indexing job.
    pub async fn start_index(&self) -> Result<()> {
        self.call(CoreCommand::MediaIndex).await?;
        Ok(())
    }

    /// Reads all device settings as raw JSON.
    pub async fn settings(&self) -> Result<Value> {
        self.call(CoreCommand::SettingsGet).await
    }

    /// Updates a subset of device settings.
    pub async fn update_settings(&self, values: Value) -> Result<()> {
        self.call(CoreCommand::SettingsUpdate(values)).await?;
        Ok(())
    }

    /// Lists the systems the device can launch.
    pub async fn systems(&self) -> Result<SystemList> {
        self.call_typed(CoreCommand::SystemsList).await
    }

    /// Queries the device service version.
    pub async fn version(&self) -> Result<VersionInfo> {
        self.call_typed(CoreCommand::Version).await
    }

    /// Issues a call and decodes the result payload.
    async fn call_typed<T: DeserializeOwned>(&self, command: CoreCommand) -> Result<T> {
        let value = self.call(command).await?;
        serde_json::from_value(value).map_err(Error::from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;

    use crate::manager::DeviceConfig;
    use crate::protocol::IndexingStatus;
    use crate::router::Toast;

    /// Minimal notification handler recording UI-facing effects.
    #[derive(Default)]
    struct UiState {
        playing: Mutex<Vec<PlayingMedia>>,
        toasts: Mutex<Vec<Toast>>,
    }

    impl NotificationHandler for UiState {
        fn playing_changed(&self, media: PlayingMedia) {
            self.playing.lock().push(media);
        }
        fn token_scanned(&self, _token: ScannedToken) {}
        fn indexing_changed(&self, _status: IndexingStatus) {}
        fn toast(&self, toast: Toast) {
            self.toasts.lock().push(toast);
        }
    }

    /// Counters for the mock device's query methods.
    #[derive(Default)]
    struct CallCounts {
        media: AtomicUsize,
        tokens: AtomicUsize,
    }

    /// Serves one WebSocket connection speaking the device's JSON-RPC.
    async fn serve_device(listener: TcpListener, counts: Arc<CallCounts>) {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else { continue };
            let frame: Value = serde_json::from_str(text.as_str()).expect("request json");
            let id = frame["id"].clone();
            let result = match frame["method"].as_str().unwrap_or_default() {
                "media.active" => {
                    counts.media.fetch_add(1, Ordering::SeqCst);
                    json!({
                        "systemId": "snes",
                        "systemName": "Super Nintendo",
                        "mediaPath": "/games/mario.sfc",
                        "mediaName": "Super Mario World"
                    })
                }
                "tokens.active" => {
                    counts.tokens.fetch_add(1, Ordering::SeqCst);
                    json!({"uid": "ABC123"})
                }
                "version" => json!({"version": "2.0.1", "platform": "mister"}),
                _ => Value::Null,
            };
            let reply = json!({"id": id, "result": result}).to_string();
            ws.send(Message::Text(reply.into())).await.expect("reply");
        }
    }

    async fn bound_listener() -> (String, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        (addr, listener)
    }

    fn client() -> Arc<CoreClient> {
        CoreClient::new(ConnectionManager::new(ConnectionConfig::new()))
    }

    /// Consumer handlers per the UI contract: on connect, flush the queue
    /// and pull media + token state once.
    fn consumer_handlers(client: &Arc<CoreClient>) -> EventHandlers {
        let on_change = Arc::clone(client);
        let on_message = Arc::clone(client);

        EventHandlers {
            on_connection_change: Box::new(move |device_id, change| {
                if on_change.manager().active_device_id().as_ref() != Some(device_id) {
                    return;
                }
                if change.state == ConnectionState::Connected {
                    on_change.flush_queue();
                    let fetch = Arc::clone(&on_change);
                    tokio::spawn(async move {
                        let _ = fetch.media().await;
                        let _ = fetch.tokens().await;
                    });
                }
            }),
            on_message: Box::new(move |device_id, text| {
                if on_message.manager().active_device_id().as_ref() != Some(device_id) {
                    return;
                }
                let _ = on_message.process_received(text);
            }),
            on_error: Box::new(|_, _| {}),
        }
    }

    #[tokio::test]
    async fn test_call_without_active_device_fails() {
        let client = client();
        let err = client.version().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_process_received_routes_notifications() {
        let client = client();
        let ui = Arc::new(UiState::default());
        client.set_notification_handler(Arc::clone(&ui) as Arc<dyn NotificationHandler>);

        client
            .process_received(r#"{"method": "media.stopped"}"#)
            .expect("notification");

        let playing = ui.playing.lock();
        assert_eq!(playing.len(), 1);
        assert!(playing[0].is_empty());
    }

    #[tokio::test]
    async fn test_process_received_rejects_garbage_with_one_toast() {
        let client = client();
        let ui = Arc::new(UiState::default());
        client.set_notification_handler(Arc::clone(&ui) as Arc<dyn NotificationHandler>);

        assert!(client.process_received("not json at all").is_err());
        assert!(client.process_received("still not json").is_err());
        assert_eq!(ui.toasts.lock().len(), 1, "error toast is rate-limited");

        // The session remains usable for well-formed frames.
        client
            .process_received(r#"{"method": "media.stopped"}"#)
            .expect("notification");
        assert_eq!(ui.playing.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_late_response_is_discarded_silently() {
        let client = client();
        client
            .process_received(r#"{"id": 123456789, "result": {"stale": true}}"#)
            .expect("late response is not an error");
    }

    #[tokio::test]
    async fn test_reset_cancels_queued_calls() {
        let client = client();
        let manager = Arc::clone(client.manager());

        // Registered but never connected: calls queue for the flush.
        let config = DeviceConfig::websocket("127.0.0.1:1");
        manager.add_device(config.clone()).expect("add");
        manager.set_active_device(&config.device_id).expect("activate");

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.version().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.correlator().queued_count(), 1);

        client.reset();

        let err = pending.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(client.correlator().queued_count(), 0);

        manager.shutdown();
    }

    #[tokio::test]
    async fn test_connect_scenario_fetches_state_exactly_once() {
        let (addr, listener) = bound_listener().await;
        let counts = Arc::new(CallCounts::default());
        tokio::spawn(serve_device(listener, Arc::clone(&counts)));

        let client = client();
        let manager = Arc::clone(client.manager());
        manager.set_event_handlers(consumer_handlers(&client));

        let config = DeviceConfig::websocket(&addr);
        let transport = manager.add_device(config.clone()).expect("add");
        manager.set_active_device(&config.device_id).expect("activate");
        transport.connect();

        // Wait for the post-connect fetches to land.
        timeout(Duration::from_secs(5), async {
            while counts.media.load(Ordering::SeqCst) < 1
                || counts.tokens.load(Ordering::SeqCst) < 1
            {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("state fetched after connect");

        // Settle: no duplicate fetches follow.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counts.media.load(Ordering::SeqCst), 1);
        assert_eq!(counts.tokens.load(Ordering::SeqCst), 1);

        manager.shutdown();
    }

    #[tokio::test]
    async fn test_events_from_non_active_device_cause_no_fetches() {
        let (addr_a, listener_a) = bound_listener().await;
        let counts = Arc::new(CallCounts::default());
        tokio::spawn(serve_device(listener_a, Arc::clone(&counts)));

        let client = client();
        let manager = Arc::clone(client.manager());
        manager.set_event_handlers(consumer_handlers(&client));

        // Device A connects, but device B is the active one.
        let config_a = DeviceConfig::websocket(&addr_a);
        let config_b = DeviceConfig::websocket("127.0.0.1:1");
        let transport_a = manager.add_device(config_a).expect("add a");
        manager.add_device(config_b.clone()).expect("add b");
        manager.set_active_device(&config_b.device_id).expect("activate b");

        transport_a.connect();
        timeout(Duration::from_secs(5), async {
            while !transport_a.is_connected() {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("device a connects");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counts.media.load(Ordering::SeqCst), 0);
        assert_eq!(counts.tokens.load(Ordering::SeqCst), 0);

        manager.shutdown();
    }

    #[tokio::test]
    async fn test_typed_call_roundtrip() {
        let (addr, listener) = bound_listener().await;
        tokio::spawn(serve_device(listener, Arc::new(CallCounts::default())));

        let client = client();
        let manager = Arc::clone(client.manager());
        client.attach();

        let config = DeviceConfig::websocket(&addr);
        let transport = manager.add_device(config.clone()).expect("add");
        manager.set_active_device(&config.device_id).expect("activate");
        transport.connect();

        timeout(Duration::from_secs(5), async {
            while !transport.is_connected() {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("connected");

        let version = client.version().await.expect("version call");
        assert_eq!(version.version, "2.0.1");
        assert_eq!(version.platform, "mister");

        let media = client.media().await.expect("media call");
        assert_eq!(media.media_name, "Super Mario World");

        manager.shutdown();
    }
}
