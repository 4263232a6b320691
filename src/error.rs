//! Error types for the corelink transport core.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use corelink::{Result, Error};
//!
//! async fn example(client: &CoreClient) -> Result<()> {
//!     let media = client.media().await?;
//!     println!("{}", media.media_name);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::InvalidAddress`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Calls | [`Error::Cancelled`], [`Error::Remote`], [`Error::RequestTimeout`] |
//! | Protocol | [`Error::MalformedFrame`] |
//! | Registry | [`Error::UnknownDevice`], [`Error::DuplicateDevice`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! Transport-level errors are recovered locally (reconnect with backoff) and
//! reach the UI only as connection-state changes; call-level errors propagate
//! to the specific caller that issued the call.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{CallId, DeviceId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Device address could not be parsed into a WebSocket URL.
    ///
    /// Terminal: the transport enters the `Error` state without retrying.
    #[error("Invalid device address: {address}")]
    InvalidAddress {
        /// The address that failed to parse.
        address: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Socket-level connect or I/O failure.
    ///
    /// Retried automatically via backoff; surfaced to the UI only as a
    /// connection-state change.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt did not complete within the configured timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An operation required a connected transport but the transport was not
    /// in the `Connected` state (and the offline queue was full or absent).
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// A correlated call never received a response because the connection
    /// dropped or the correlator was reset.
    #[error("Call cancelled")]
    Cancelled,

    /// The device explicitly returned an error payload for a call.
    ///
    /// Carries the device-supplied code and message verbatim.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Device-supplied error code.
        code: i64,
        /// Device-supplied error message.
        message: String,
    },

    /// A correlated call timed out waiting for its response.
    #[error("Call {call_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The call ID that timed out.
        call_id: CallId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// A received frame could not be parsed or matched no known shape.
    ///
    /// Logged and dropped at the routing boundary; never tears down the
    /// connection.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Description of the parse failure.
        message: String,
    },

    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// The device ID is not registered with the connection manager.
    #[error("Unknown device: {device_id}")]
    UnknownDevice {
        /// The missing device ID.
        device_id: DeviceId,
    },

    /// A device with this ID is already registered under a different address.
    #[error("Duplicate device: {device_id}")]
    DuplicateDevice {
        /// The conflicting device ID.
        device_id: DeviceId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a remote error from a device error payload.
    #[inline]
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(call_id: CallId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            call_id,
            timeout_ms,
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates an unknown device error.
    #[inline]
    pub fn unknown_device(device_id: DeviceId) -> Self {
        Self::UnknownDevice { device_id }
    }

    /// Creates a duplicate device error.
    #[inline]
    pub fn duplicate_device(device_id: DeviceId) -> Self {
        Self::DuplicateDevice { device_id }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is delivered to a specific caller
    /// (call-level) rather than recovered inside the transport.
    #[inline]
    #[must_use]
    pub fn is_call_error(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Remote { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this error is recoverable by retrying.
    ///
    /// Recoverable errors may succeed once the connection is re-established.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::Cancelled
                | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
