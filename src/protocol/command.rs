//! Outbound command definitions.
//!
//! Commands follow `module.methodName` format and serialize into the
//! `{"method": ..., "params": ...}` envelope via serde's adjacent tagging;
//! parameterless commands omit the `params` key entirely.
//!
//! # Command Modules
//!
//! | Module | Commands |
//! |--------|----------|
//! | `media` | Active media, indexing, search |
//! | `tokens` | Active/last token, history, launch, stop |
//! | `settings` | Read and update device settings |
//! | `systems` | List launchable systems |
//! | — | `version` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// CoreCommand
// ============================================================================

/// All commands the client can issue to the device.
///
/// The method-name surface is owned by the device firmware; this enum is the
/// client's snapshot of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum CoreCommand {
    /// Query the currently playing media.
    #[serde(rename = "media.active")]
    MediaActive,

    /// Start (or restart) the media database indexing job.
    #[serde(rename = "media.index")]
    MediaIndex,

    /// Search the media database.
    #[serde(rename = "media.search")]
    MediaSearch {
        /// Free-text query.
        query: String,
        /// Restrict the search to these system IDs (empty = all).
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        systems: Vec<String>,
    },

    /// Query the token currently on the reader (or last scanned).
    #[serde(rename = "tokens.active")]
    TokensActive,

    /// Query the scan history.
    #[serde(rename = "tokens.history")]
    TokensHistory,

    /// Launch media as if a token with this text had been scanned.
    #[serde(rename = "tokens.launch")]
    Launch {
        /// Token text (e.g. `**launch:snes/mario.sfc`).
        text: String,
    },

    /// Stop the currently running media.
    #[serde(rename = "tokens.stop")]
    Stop,

    /// Read all device settings.
    #[serde(rename = "settings.get")]
    SettingsGet,

    /// Update a subset of device settings.
    #[serde(rename = "settings.update")]
    SettingsUpdate(Value),

    /// List the systems the device can launch.
    #[serde(rename = "systems.list")]
    SystemsList,

    /// Query the device service version.
    #[serde(rename = "version")]
    Version,
}

// ============================================================================
// Tests
// ============================================================================
