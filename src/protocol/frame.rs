//! Request, Response, and inbound frame classification.
//!
//! Defines the JSON-RPC-shaped message envelopes exchanged with the Core
//! device over the WebSocket.
//!
//! # Format
//!
//! | Frame | Shape |
//! |-------|-------|
//! | Request | `{"id": 7, "method": "...", "params": {...}}` |
//! | Response (ok) | `{"id": 7, "result": ...}` |
//! | Response (err) | `{"id": 7, "error": {"code": ..., "message": ...}}` |
//! | Notification | `{"method": "...", "params": {...}}` (no `id`) |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::CallId;

use super::CoreCommand;

// ============================================================================
// Request
// ============================================================================

/// A correlated command request from the app to the device.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: CallId,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: CoreCommand,
}

impl Request {
    /// Creates a new request with a freshly allocated ID.
    #[inline]
    #[must_use]
    pub fn new(command: CoreCommand) -> Self {
        Self {
            id: CallId::next(),
            command,
        }
    }

    /// Creates a new request with a specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: CallId, command: CoreCommand) -> Self {
        Self { id, command }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the device for one correlated call.
///
/// Exactly one of `result` and `error` is populated by a well-formed device;
/// [`Response::into_result`] treats a missing `result` on a non-error
/// response as `Value::Null`.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: CallId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (if the device rejected the call).
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, mapping a device error payload to
    /// [`Error::Remote`].
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(Error::remote(err.code, err.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// ErrorPayload
// ============================================================================

/// Device-supplied error body inside an error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    /// Numeric error code.
    #[serde(default)]
    pub code: i64,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// NotificationFrame
// ============================================================================

/// An inbound frame with a `method` but no correlation `id`.
///
/// Decoded into a typed [`super::Notification`] by the router.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationFrame {
    /// Notification method name (e.g. `media.started`).
    pub method: String,

    /// Method-specific payload.
    #[serde(default)]
    pub params: Value,
}

// ============================================================================
// Frame
// ============================================================================

/// Classification of one inbound frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A response to an outstanding correlated call.
    Response(Response),

    /// A server-originated notification with no originating request.
    Notification(NotificationFrame),
}

impl Frame {
    /// Parses and classifies one inbound text frame.
    ///
    /// A frame carrying an `id` together with `result` or `error` is a
    /// response; a frame carrying a `method` is a notification; anything
    /// else is malformed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the text is not valid JSON or
    /// matches neither shape.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;

        let Some(object) = value.as_object() else {
            return Err(Error::malformed("frame is not a JSON object"));
        };

        if object.contains_key("id") && (object.contains_key("result") || object.contains_key("error"))
        {
            let response: Response = serde_json::from_value(value.clone())
                .map_err(|e| Error::malformed(format!("invalid response frame: {e}")))?;
            return Ok(Self::Response(response));
        }

        if object.contains_key("method") {
            let notification: NotificationFrame = serde_json::from_value(value.clone())
                .map_err(|e| Error::malformed(format!("invalid notification frame: {e}")))?;
            return Ok(Self::Notification(notification));
        }

        Err(Error::malformed("frame is neither response nor notification"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = Request::with_id(CallId::from_u64(7), CoreCommand::Launch {
            text: "**launch:snes/mario.sfc".to_string(),
        });
        let json = serde_json::to_string(&request).expect("serialize");

        assert!(json.contains("\"id\":7"));
        assert!(json.contains("tokens.launch"));
        assert!(json.contains("**launch:snes/mario.sfc"));
    }

    #[test]
    fn test_request_new_allocates_fresh_ids() {
        let a = Request::new(CoreCommand::Version);
        let b = Request::new(CoreCommand::Version);
        assert!(a.id < b.id);
    }

    #[test]
    fn test_parse_success_response() {
        let frame = Frame::parse(r#"{"id": 3, "result": {"version": "2.0.1"}}"#).expect("parse");
        match frame {
            Frame::Response(response) => {
                assert_eq!(response.id, CallId::from_u64(3));
                assert!(!response.is_error());
                let result = response.into_result().expect("result");
                assert_eq!(result["version"], "2.0.1");
            }
            Frame::Notification(_) => panic!("expected response"),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let frame = Frame::parse(r#"{"id": 4, "error": {"code": -32000, "message": "busy"}}"#)
            .expect("parse");
        match frame {
            Frame::Response(response) => {
                assert!(response.is_error());
                let err = response.into_result().unwrap_err();
                assert!(matches!(err, Error::Remote { code: -32000, .. }));
            }
            Frame::Notification(_) => panic!("expected response"),
        }
    }

    #[test]
    fn test_parse_notification() {
        let frame = Frame::parse(r#"{"method": "media.started", "params": {"systemId": "snes"}}"#)
            .expect("parse");
        match frame {
            Frame::Notification(notification) => {
                assert_eq!(notification.method, "media.started");
                assert_eq!(notification.params["systemId"], "snes");
            }
            Frame::Response(_) => panic!("expected notification"),
        }
    }

    #[test]
    fn test_parse_notification_without_params() {
        let frame = Frame::parse(r#"{"method": "media.stopped"}"#).expect("parse");
        match frame {
            Frame::Notification(notification) => {
                assert_eq!(notification.method, "media.stopped");
                assert!(notification.params.is_null());
            }
            Frame::Response(_) => panic!("expected notification"),
        }
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let err = Frame::parse("not json").unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn test_parse_rejects_unclassifiable_object() {
        let err = Frame::parse(r#"{"id": 9}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = Frame::parse("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn test_null_result_maps_to_null_value() {
        let frame = Frame::parse(r#"{"id": 5, "result": null}"#).expect("parse");
        match frame {
            Frame::Response(response) => {
                assert_eq!(response.into_result().expect("ok"), Value::Null);
            }
            Frame::Notification(_) => panic!("expected response"),
        }
    }
}
