//! corelink - Connection and transport core for Core-device companion apps.
//!
//! This library is the connection subsystem of a companion app for a remote
//! "Core" media device: it maintains a persistent duplex WebSocket to the
//! device, survives network flaps and app backgrounding, de-duplicates and
//! replays in-flight requests, and fans asynchronously arriving device
//! notifications out to application state.
//!
//! # Architecture
//!
//! Leaf-first:
//!
//! - **[`Transport`]** - one device's socket lifecycle: dialing, heartbeat,
//!   reconnect backoff
//! - **[`ConnectionManager`]** - registry of transports keyed by device ID,
//!   one "active" device, single event fan-out point
//! - **[`Correlator`]** - turns fire-and-forget sends into awaitable calls
//!   with correlation IDs and an offline replay queue
//! - **[`NotificationRouter`]** - decodes uncorrelated frames into a closed
//!   notification union and dispatches them to application state
//! - **[`CoreClient`]** - session facade tying the layers together with
//!   typed API calls
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use corelink::{ConnectionConfig, ConnectionManager, CoreClient, DeviceConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::new(ConnectionConfig::new());
//!     let client = CoreClient::new(Arc::clone(&manager));
//!     client.attach();
//!
//!     let transport = manager.add_device(DeviceConfig::websocket("192.168.1.100:7497"))?;
//!     manager.set_active_device(transport.device_id())?;
//!     transport.connect();
//!
//!     let media = client.media().await?;
//!     println!("Now playing: {}", media.media_name);
//!
//!     Ok(())
//! }
//! ```
//!
//! # App Lifecycle
//!
//! The host environment forwards two signals:
//!
//! - background/foreground → [`ConnectionManager::pause_all`] /
//!   [`ConnectionManager::resume_all`] (heartbeats suspend, sockets stay up)
//! - network restored → [`ConnectionManager::immediate_reconnect_active`]
//!   (skips any outstanding backoff window)
//!
//! Both are commutative-safe: repeating or pairing them is a no-op.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Session facade and typed API calls |
//! | [`config`] | Backoff/heartbeat/timeout tuning |
//! | [`correlator`] | Request/response correlation |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | Device registry and event fan-out |
//! | [`protocol`] | Wire message types (internal shape) |
//! | [`router`] | Notification decoding and dispatch |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Session facade and typed API calls.
pub mod client;

/// Connection tuning configuration.
pub mod config;

/// Request/response correlation.
pub mod correlator;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for devices and calls.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Device registry and event fan-out.
pub mod manager;

/// Wire protocol message types.
pub mod protocol;

/// Notification routing and dispatch.
pub mod router;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::CoreClient;

// Configuration
pub use config::ConnectionConfig;

// Correlator types
pub use correlator::{Correlator, Wire};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallId, DeviceId};

// Manager types
pub use manager::{ConnectionManager, DeviceConfig, DeviceKind, EventHandlers};

// Protocol types
pub use protocol::{
    CoreCommand, Frame, IndexingPhase, IndexingStatus, Notification, PlayingMedia, ScannedToken,
    SearchResults, SystemList, TokenHistory, VersionInfo,
};

// Router types
pub use router::{NotificationHandler, NotificationRouter, Toast, ToastGate, ToastSeverity};

// Transport types
pub use transport::{ConnectionChange, ConnectionState, Transport};
