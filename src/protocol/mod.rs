//! Wire protocol message types.
//!
//! This module defines the JSON-RPC-shaped message format exchanged with the
//! Core device over the WebSocket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | App → Device | Correlated command request |
//! | `Response` | Device → App | Command response (`result` or `error`) |
//! | `NotificationFrame` | Device → App | Uncorrelated state/event push |
//!
//! The method-name surface is owned by the device firmware and evolves;
//! unknown notification methods are ignored, never fatal.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command definitions |
//! | `frame` | Request/Response envelopes and frame classification |
//! | `notification` | Typed notification decoding |
//! | `payloads` | Typed payload records shared by notifications and results |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command definitions.
pub mod command;

/// Request, Response, and inbound frame classification.
pub mod frame;

/// Typed notification decoding.
pub mod notification;

/// Typed payload records.
pub mod payloads;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::CoreCommand;
pub use frame::{ErrorPayload, Frame, NotificationFrame, Request, Response};
pub use notification::{Notification, methods};
pub use payloads::{
    HistoryEntry, IndexingPhase, IndexingStatus, PlayingMedia, PlaytimeNotice, ScannedToken,
    SearchResult, SearchResults, SystemInfo, SystemList, TokenHistory, VersionInfo,
};
