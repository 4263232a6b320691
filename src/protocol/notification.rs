//! Typed notification decoding.
//!
//! Notifications are server-originated frames with no correlation id,
//! classified by method name. The decode step produces a closed tagged union
//! so the router's dispatch is an exhaustive, compile-time-checked match;
//! adding a notification type means adding a variant, not a runtime table
//! entry.
//!
//! # Known Methods
//!
//! | Method | Variant | Payload |
//! |--------|---------|---------|
//! | `media.started` | [`Notification::MediaStarted`] | [`PlayingMedia`] |
//! | `media.stopped` | [`Notification::MediaStopped`] | — |
//! | `media.indexing` | [`Notification::MediaIndexing`] | [`IndexingStatus`] |
//! | `tokens.added` | [`Notification::TokenAdded`] | [`ScannedToken`] |
//! | `tokens.removed` | [`Notification::TokenRemoved`] | — |
//! | `playtime.warning` | [`Notification::PlaytimeWarning`] | [`PlaytimeNotice`] |
//! | `playtime.limitReached` | [`Notification::PlaytimeLimitReached`] | [`PlaytimeNotice`] |
//!
//! Anything else decodes to [`Notification::Unknown`] and is dropped
//! silently, for forward compatibility with firmware the client does not
//! yet understand.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::{Error, Result};

use super::payloads::{IndexingStatus, PlayingMedia, PlaytimeNotice, ScannedToken};

// ============================================================================
// Method Names
// ============================================================================

/// Notification method names owned by the device firmware.
pub mod methods {
    /// Media began playing.
    pub const MEDIA_STARTED: &str = "media.started";
    /// Media stopped playing.
    pub const MEDIA_STOPPED: &str = "media.stopped";
    /// Media database indexing progress.
    pub const MEDIA_INDEXING: &str = "media.indexing";
    /// A token was scanned.
    pub const TOKENS_ADDED: &str = "tokens.added";
    /// The token left the reader.
    pub const TOKENS_REMOVED: &str = "tokens.removed";
    /// Playtime limit approaching.
    pub const PLAYTIME_WARNING: &str = "playtime.warning";
    /// Playtime limit reached.
    pub const PLAYTIME_LIMIT_REACHED: &str = "playtime.limitReached";
}

// ============================================================================
// Notification
// ============================================================================

/// A decoded server notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Media began playing; replaces the "currently playing" record.
    MediaStarted(PlayingMedia),

    /// Media stopped; the "currently playing" record resets to the all-empty
    /// sentinel.
    MediaStopped,

    /// Indexing progress update.
    MediaIndexing(IndexingStatus),

    /// A token was scanned; replaces the "last token" record.
    TokenAdded(ScannedToken),

    /// The physical token left the reader.
    TokenRemoved,

    /// Playtime limit approaching; pure side effect.
    PlaytimeWarning(PlaytimeNotice),

    /// Playtime limit reached; pure side effect.
    PlaytimeLimitReached(PlaytimeNotice),

    /// Method the client does not understand; ignored.
    Unknown {
        /// The unrecognized method name.
        method: String,
    },
}

impl Notification {
    /// Decodes a notification frame into its typed variant.
    ///
    /// Unknown methods succeed as [`Notification::Unknown`]; a known method
    /// with a payload that fails to decode is a [`Error::MalformedFrame`]
    /// (dropped at the router boundary, never thrown past it).
    pub fn decode(method: &str, params: &Value) -> Result<Self> {
        let malformed =
            |e: serde_json::Error| Error::malformed(format!("{method} payload: {e}"));

        match method {
            methods::MEDIA_STARTED => serde_json::from_value(params.clone())
                .map(Self::MediaStarted)
                .map_err(malformed),

            methods::MEDIA_STOPPED => Ok(Self::MediaStopped),

            methods::MEDIA_INDEXING => serde_json::from_value(params.clone())
                .map(Self::MediaIndexing)
                .map_err(malformed),

            methods::TOKENS_ADDED => serde_json::from_value(params.clone())
                .map(Self::TokenAdded)
                .map_err(malformed),

            methods::TOKENS_REMOVED => Ok(Self::TokenRemoved),

            methods::PLAYTIME_WARNING => serde_json::from_value(params.clone())
                .map(Self::PlaytimeWarning)
                .map_err(malformed),

            methods::PLAYTIME_LIMIT_REACHED => serde_json::from_value(params.clone())
                .map(Self::PlaytimeLimitReached)
                .map_err(malformed),

            _ => Ok(Self::Unknown {
                method: method.to_string(),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
