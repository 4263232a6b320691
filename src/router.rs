//! Notification routing and dispatch.
//!
//! Classified inbound frames that are not call responses arrive here as
//! method + params pairs. The router decodes them into the closed
//! [`Notification`] union and dispatches each variant to the registered
//! [`NotificationHandler`] with an exhaustive match, so a new notification
//! type is a compile-time-checked addition rather than a runtime table
//! lookup.
//!
//! Malformed payloads are logged and dropped (a single bad frame must not
//! tear down the connection) and surface to the user only as a rate-limited
//! error toast. Unknown methods are dropped silently for forward
//! compatibility with newer firmware.
//!
//! Handlers must be safe to call redundantly (idempotent set semantics):
//! duplicate or out-of-order notifications are possible.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{trace, warn};

use crate::config::ConnectionConfig;
use crate::protocol::{
    IndexingStatus, Notification, NotificationFrame, PlayingMedia, ScannedToken,
};

// ============================================================================
// Toast
// ============================================================================

/// Severity of a user-visible toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastSeverity {
    /// Informational.
    Info,
    /// Something needs attention soon.
    Warning,
    /// Something failed.
    Error,
}

/// One user-visible toast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Display severity.
    pub severity: ToastSeverity,
    /// Message text.
    pub message: String,
}

impl Toast {
    /// Creates a warning toast.
    #[inline]
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: ToastSeverity::Warning,
            message: message.into(),
        }
    }

    /// Creates an error toast.
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: ToastSeverity::Error,
            message: message.into(),
        }
    }
}

// ============================================================================
// NotificationHandler
// ============================================================================

/// Application-side sink for decoded notifications.
///
/// State setters replace their record wholesale, so calling them redundantly
/// is safe; side-effect methods are already rate-limited by the router.
pub trait NotificationHandler: Send + Sync {
    /// Replaces the "currently playing" record.
    ///
    /// Receives the all-empty sentinel when media stops.
    fn playing_changed(&self, media: PlayingMedia);

    /// Replaces the "last token" record.
    fn token_scanned(&self, token: ScannedToken);

    /// The physical token left the reader.
    fn token_removed(&self) {}

    /// Replaces the indexing progress record.
    fn indexing_changed(&self, status: IndexingStatus);

    /// Shows a user-visible toast.
    fn toast(&self, toast: Toast);

    /// Announces a message to assistive technology.
    fn announce(&self, message: &str) {
        let _ = message;
    }
}

// ============================================================================
// ToastGate
// ============================================================================

/// Rate limiter for one class of toast.
///
/// Allows at most one toast per window; driven with explicit instants so
/// tests use a virtual clock.
#[derive(Debug, Clone)]
pub struct ToastGate {
    /// Minimum gap between allowed toasts.
    window: Duration,
    /// When the last toast was allowed.
    last: Option<Instant>,
}

impl ToastGate {
    /// Creates a gate with the given window.
    #[inline]
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns `true` and arms the window if a toast may fire at `now`.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now < last + self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forgets the armed window.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

// ============================================================================
// NotificationRouter
// ============================================================================

/// Decodes and dispatches server notifications.
pub struct NotificationRouter {
    /// Registered handler; survives resets.
    handler: Mutex<Option<Arc<dyn NotificationHandler>>>,

    /// Gate for playtime warning/limit toasts.
    playtime_gate: Mutex<ToastGate>,

    /// Gate for malformed-frame error toasts.
    error_gate: Mutex<ToastGate>,
}

impl NotificationRouter {
    /// Creates a router from connection tuning.
    #[must_use]
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            handler: Mutex::new(None),
            playtime_gate: Mutex::new(ToastGate::new(config.toast_window)),
            error_gate: Mutex::new(ToastGate::new(config.toast_window)),
        }
    }

    /// Registers the notification handler, replacing any prior one.
    pub fn set_handler(&self, handler: Arc<dyn NotificationHandler>) {
        *self.handler.lock() = Some(handler);
    }

    /// Removes the notification handler.
    pub fn clear_handler(&self) {
        *self.handler.lock() = None;
    }

    /// Decodes and dispatches one notification frame.
    ///
    /// Never errors past this boundary: malformed payloads are logged,
    /// reported through the rate-limited error toast, and dropped.
    pub fn route(&self, frame: &NotificationFrame) {
        self.route_at(&frame.method, &frame.params, Instant::now());
    }

    /// Dispatches an already-decoded notification.
    pub fn dispatch(&self, notification: Notification) {
        self.dispatch_at(notification, Instant::now());
    }

    /// Reports a frame that failed to parse upstream of decoding.
    ///
    /// Shares the malformed-payload toast gate, so a reconnect storm of bad
    /// frames produces at most one toast per window.
    pub fn report_malformed(&self, detail: &str) {
        self.report_malformed_at(detail, Instant::now());
    }

    /// Clears transient state (toast gates) without unregistering handlers.
    ///
    /// Part of the logical-disconnect reset path.
    pub fn reset(&self) {
        self.playtime_gate.lock().reset();
        self.error_gate.lock().reset();
    }

    // ------------------------------------------------------------------
    // Clock-explicit internals
    // ------------------------------------------------------------------

    fn route_at(&self, method: &str, params: &Value, now: Instant) {
        match Notification::decode(method, params) {
            Ok(notification) => self.dispatch_at(notification, now),
            Err(e) => {
                warn!(method, error = %e, "notification payload dropped");
                self.report_malformed_at(&e.to_string(), now);
            }
        }
    }

    fn dispatch_at(&self, notification: Notification, now: Instant) {
        let Some(handler) = self.handler.lock().clone() else {
            trace!("notification dropped, no handler registered");
            return;
        };

        match notification {
            Notification::MediaStarted(media) => handler.playing_changed(media),

            Notification::MediaStopped => handler.playing_changed(PlayingMedia::empty()),

            Notification::MediaIndexing(status) => handler.indexing_changed(status),

            Notification::TokenAdded(token) => handler.token_scanned(token),

            Notification::TokenRemoved => handler.token_removed(),

            Notification::PlaytimeWarning(notice) => {
                if self.playtime_gate.lock().allow(now) {
                    let message = non_empty(notice.message, "Playtime limit approaching");
                    handler.toast(Toast::warning(message.clone()));
                    handler.announce(&message);
                }
            }

            Notification::PlaytimeLimitReached(notice) => {
                if self.playtime_gate.lock().allow(now) {
                    let message = non_empty(notice.message, "Playtime limit reached");
                    handler.toast(Toast::error(message.clone()));
                    handler.announce(&message);
                }
            }

            Notification::Unknown { method } => {
                trace!(method, "ignoring unknown notification method");
            }
        }
    }

    fn report_malformed_at(&self, detail: &str, now: Instant) {
        warn!(detail, "malformed frame dropped");
        if self.error_gate.lock().allow(now) {
            let handler = self.handler.lock().clone();
            if let Some(handler) = handler {
                handler.toast(Toast::error("Received an invalid message from the device"));
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns `message` unless it is empty, falling back to `fallback`.
fn non_empty(message: String, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::protocol::methods;

    /// Handler double that records every dispatch.
    #[derive(Default)]
    struct Recording {
        playing: Mutex<Vec<PlayingMedia>>,
        tokens: Mutex<Vec<ScannedToken>>,
        indexing: Mutex<Vec<IndexingStatus>>,
        toasts: Mutex<Vec<Toast>>,
        announcements: Mutex<Vec<String>>,
        removals: AtomicUsize,
    }

    impl NotificationHandler for Recording {
        fn playing_changed(&self, media: PlayingMedia) {
            self.playing.lock().push(media);
        }
        fn token_scanned(&self, token: ScannedToken) {
            self.tokens.lock().push(token);
        }
        fn token_removed(&self) {
            self.removals.fetch_add(1, Ordering::SeqCst);
        }
        fn indexing_changed(&self, status: IndexingStatus) {
            self.indexing.lock().push(status);
        }
        fn toast(&self, toast: Toast) {
            self.toasts.lock().push(toast);
        }
        fn announce(&self, message: &str) {
            self.announcements.lock().push(message.to_string());
        }
    }

    fn router_with_handler() -> (NotificationRouter, Arc<Recording>) {
        let router = NotificationRouter::new(&ConnectionConfig::new());
        let handler = Arc::new(Recording::default());
        router.set_handler(handler.clone());
        (router, handler)
    }

    #[test]
    fn test_media_started_sets_exact_record() {
        let (router, handler) = router_with_handler();

        router.route(&NotificationFrame {
            method: methods::MEDIA_STARTED.to_string(),
            params: json!({
                "systemId": "snes",
                "systemName": "Super Nintendo",
                "mediaPath": "/games/mario.sfc",
                "mediaName": "Super Mario World"
            }),
        });

        let playing = handler.playing.lock();
        assert_eq!(playing.len(), 1);
        assert_eq!(playing[0].system_id, "snes");
        assert_eq!(playing[0].system_name, "Super Nintendo");
        assert_eq!(playing[0].media_path, "/games/mario.sfc");
        assert_eq!(playing[0].media_name, "Super Mario World");
    }

    #[test]
    fn test_media_stopped_resets_to_empty_sentinel() {
        let (router, handler) = router_with_handler();

        router.dispatch(Notification::MediaStarted(PlayingMedia {
            system_id: "snes".to_string(),
            system_name: "Super Nintendo".to_string(),
            media_path: "/games/mario.sfc".to_string(),
            media_name: "Super Mario World".to_string(),
        }));
        router.route(&NotificationFrame {
            method: methods::MEDIA_STOPPED.to_string(),
            params: Value::Null,
        });

        let playing = handler.playing.lock();
        assert_eq!(playing.len(), 2);
        assert!(playing[1].is_empty());
        assert_eq!(playing[1].system_id, "");
        assert_eq!(playing[1].media_name, "");
    }

    #[test]
    fn test_token_added_sets_exact_record() {
        let (router, handler) = router_with_handler();

        router.route(&NotificationFrame {
            method: methods::TOKENS_ADDED.to_string(),
            params: json!({
                "uid": "ABC123",
                "text": "**launch:snes/mario.sfc",
                "data": "launch data",
                "scanTime": "2024-01-15T12:00:00Z"
            }),
        });

        let tokens = handler.tokens.lock();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].uid, "ABC123");
        assert_eq!(tokens[0].text, "**launch:snes/mario.sfc");
        assert_eq!(tokens[0].data, "launch data");
        assert_eq!(tokens[0].scan_time, "2024-01-15T12:00:00Z");
    }

    #[test]
    fn test_unknown_method_touches_nothing() {
        let (router, handler) = router_with_handler();

        router.route(&NotificationFrame {
            method: "firmware.mystery".to_string(),
            params: json!({"anything": [1, 2, 3]}),
        });

        assert!(handler.playing.lock().is_empty());
        assert!(handler.tokens.lock().is_empty());
        assert!(handler.indexing.lock().is_empty());
        assert!(handler.toasts.lock().is_empty());
        assert_eq!(handler.removals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_payload_drops_frame_and_rate_limits_toast() {
        let (router, handler) = router_with_handler();
        let t0 = Instant::now();

        // systemId must be a string; decode fails.
        let bad = json!({"systemId": 42});
        router.route_at(methods::MEDIA_STARTED, &bad, t0);
        router.route_at(methods::MEDIA_STARTED, &bad, t0 + Duration::from_secs(1));

        assert!(handler.playing.lock().is_empty());
        assert_eq!(handler.toasts.lock().len(), 1, "one toast per window");

        // The connection stays usable: a good frame still dispatches.
        router.route_at(
            methods::MEDIA_STARTED,
            &json!({"systemId": "snes"}),
            t0 + Duration::from_secs(2),
        );
        assert_eq!(handler.playing.lock().len(), 1);

        // Past the window, the toast may fire again.
        router.route_at(methods::MEDIA_STARTED, &bad, t0 + Duration::from_secs(10));
        assert_eq!(handler.toasts.lock().len(), 2);
    }

    #[test]
    fn test_playtime_burst_is_rate_limited() {
        let (router, handler) = router_with_handler();
        let t0 = Instant::now();
        let notice = json!({"message": "10 minutes left"});

        for _ in 0..5 {
            router.route_at(methods::PLAYTIME_WARNING, &notice, t0);
        }

        assert_eq!(handler.toasts.lock().len(), 1);
        assert_eq!(handler.announcements.lock().len(), 1);
        assert_eq!(handler.announcements.lock()[0], "10 minutes left");
    }

    #[test]
    fn test_playtime_limit_uses_fallback_message() {
        let (router, handler) = router_with_handler();

        router.dispatch(Notification::PlaytimeLimitReached(Default::default()));

        let toasts = handler.toasts.lock();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].severity, ToastSeverity::Error);
        assert_eq!(toasts[0].message, "Playtime limit reached");
    }

    #[test]
    fn test_reset_clears_gates_but_keeps_handler() {
        let (router, handler) = router_with_handler();
        let t0 = Instant::now();
        let notice = json!({"message": "almost done"});

        router.route_at(methods::PLAYTIME_WARNING, &notice, t0);
        router.route_at(methods::PLAYTIME_WARNING, &notice, t0);
        assert_eq!(handler.toasts.lock().len(), 1);

        router.reset();

        // Same instant, but the gate was cleared by the reset.
        router.route_at(methods::PLAYTIME_WARNING, &notice, t0);
        assert_eq!(handler.toasts.lock().len(), 2);
    }

    #[test]
    fn test_route_without_handler_does_not_panic() {
        let router = NotificationRouter::new(&ConnectionConfig::new());
        router.route(&NotificationFrame {
            method: methods::MEDIA_STOPPED.to_string(),
            params: Value::Null,
        });
        router.report_malformed("garbage");
    }

    #[test]
    fn test_indexing_dispatch() {
        let (router, handler) = router_with_handler();

        router.route(&NotificationFrame {
            method: methods::MEDIA_INDEXING.to_string(),
            params: json!({
                "exists": true,
                "indexing": true,
                "totalSteps": 0,
                "currentStep": 0
            }),
        });

        let indexing = handler.indexing.lock();
        assert_eq!(indexing.len(), 1);
        assert_eq!(indexing[0].phase(), crate::protocol::IndexingPhase::Preparing);
    }

    #[test]
    fn test_token_removed_dispatch() {
        let (router, handler) = router_with_handler();
        router.route(&NotificationFrame {
            method: methods::TOKENS_REMOVED.to_string(),
            params: Value::Null,
        });
        assert_eq!(handler.removals.load(Ordering::SeqCst), 1);
        assert!(handler.tokens.lock().is_empty());
    }

    #[test]
    fn test_toast_gate_window() {
        let mut gate = ToastGate::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(gate.allow(t0));
        assert!(!gate.allow(t0 + Duration::from_secs(4)));
        assert!(gate.allow(t0 + Duration::from_secs(5)));
    }
}
