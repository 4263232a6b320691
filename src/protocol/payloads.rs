//! Typed payload records for notifications and call results.
//!
//! These records are wholesale-replacement values: a notification or query
//! result always carries a complete record, and "nothing playing" / "no token
//! scanned" are represented by the all-empty sentinel rather than an absent
//! record, so consumers can always read a well-formed value.
//!
//! Unknown fields from newer firmware are ignored; missing fields default,
//! but wrongly-typed fields fail the decode (and the frame is dropped at the
//! router boundary).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// PlayingMedia
// ============================================================================

/// The currently playing media record.
///
/// `media.stopped` resets this to [`PlayingMedia::empty`], never deletes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayingMedia {
    /// Stable system identifier (e.g. `snes`).
    #[serde(default)]
    pub system_id: String,

    /// Human-readable system name (e.g. `Super Nintendo`).
    #[serde(default)]
    pub system_name: String,

    /// Path of the running media on the device.
    #[serde(default)]
    pub media_path: String,

    /// Display name of the running media.
    #[serde(default)]
    pub media_name: String,
}

impl PlayingMedia {
    /// The all-empty "nothing playing" sentinel.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if this is the "nothing playing" sentinel.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.system_id.is_empty()
            && self.system_name.is_empty()
            && self.media_path.is_empty()
            && self.media_name.is_empty()
    }
}

// ============================================================================
// ScannedToken
// ============================================================================

/// The most recently scanned physical token.
///
/// Replaces "last token" wholesale; scan history is a separate pull-based
/// query ([`super::CoreCommand::TokensHistory`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedToken {
    /// Hardware UID of the token (empty for barcode-only tokens).
    #[serde(default)]
    pub uid: String,

    /// Decoded text content of the token.
    #[serde(default)]
    pub text: String,

    /// Raw token data as a hex string.
    #[serde(default)]
    pub data: String,

    /// RFC 3339 timestamp of the scan.
    #[serde(default)]
    pub scan_time: String,
}

// ============================================================================
// IndexingStatus
// ============================================================================

/// Progress of the device-side media database indexing job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingStatus {
    /// Whether a media database exists at all.
    #[serde(default)]
    pub exists: bool,

    /// Whether an indexing run is currently active.
    #[serde(default)]
    pub indexing: bool,

    /// Total steps in the run; `0` while the device is still preparing.
    #[serde(default)]
    pub total_steps: u64,

    /// Steps completed so far; equals `total_steps` while finalizing.
    #[serde(default)]
    pub current_step: u64,

    /// Display label for the current step (e.g. the system being indexed).
    #[serde(default)]
    pub current_step_display: Option<String>,

    /// Total media files found, known once the run completes.
    #[serde(default)]
    pub total_files: Option<u64>,
}

impl IndexingStatus {
    /// Returns the display phase for this status.
    ///
    /// `total_steps == 0` (preparing) and `current_step == total_steps`
    /// (finalizing) are distinct states from idle and mid-run progress.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> IndexingPhase {
        if !self.indexing {
            IndexingPhase::Idle
        } else if self.total_steps == 0 {
            IndexingPhase::Preparing
        } else if self.current_step >= self.total_steps {
            IndexingPhase::Finalizing
        } else {
            IndexingPhase::InProgress
        }
    }
}

/// Display phase derived from an [`IndexingStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingPhase {
    /// No indexing run is active.
    Idle,
    /// A run is active but the device has not counted its steps yet.
    Preparing,
    /// Mid-run; `current_step / total_steps` is meaningful.
    InProgress,
    /// All steps done; the device is writing out the database.
    Finalizing,
}

// ============================================================================
// PlaytimeNotice
// ============================================================================

/// Payload of a playtime warning or limit notification.
///
/// Pure side effect (toast + announcement); carries no backing state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaytimeNotice {
    /// Device-supplied user-facing message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// HistoryEntry
// ============================================================================

/// One entry of the pull-based scan history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// RFC 3339 timestamp of the scan.
    #[serde(default)]
    pub time: String,

    /// Hardware UID of the token.
    #[serde(default)]
    pub uid: String,

    /// Decoded text content.
    #[serde(default)]
    pub text: String,

    /// Whether launching the token succeeded.
    #[serde(default)]
    pub success: bool,
}

/// Result payload of [`super::CoreCommand::TokensHistory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHistory {
    /// Entries, most recent first.
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

// ============================================================================
// Search
// ============================================================================

/// One match of a media search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Display name of the media.
    #[serde(default)]
    pub name: String,

    /// System the media belongs to.
    #[serde(default)]
    pub system: String,

    /// Launchable path on the device.
    #[serde(default)]
    pub path: String,
}

/// Result payload of [`super::CoreCommand::MediaSearch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Matches, best first.
    #[serde(default)]
    pub results: Vec<SearchResult>,

    /// Total matches on the device (may exceed `results.len()`).
    #[serde(default)]
    pub total: u64,
}

// ============================================================================
// SystemInfo
// ============================================================================

/// One launchable system known to the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Stable system identifier.
    #[serde(default)]
    pub id: String,

    /// Human-readable system name.
    #[serde(default)]
    pub name: String,

    /// Grouping category (e.g. `Console`).
    #[serde(default)]
    pub category: String,
}

/// Result payload of [`super::CoreCommand::SystemsList`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemList {
    /// Known systems.
    #[serde(default)]
    pub systems: Vec<SystemInfo>,
}

// ============================================================================
// VersionInfo
// ============================================================================

/// Result payload of [`super::CoreCommand::Version`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Device service version string.
    #[serde(default)]
    pub version: String,

    /// Device platform identifier.
    #[serde(default)]
    pub platform: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playing_media_decode() {
        let json = r#"{
            "systemId": "snes",
            "systemName": "Super Nintendo",
            "mediaPath": "/games/mario.sfc",
            "mediaName": "Super Mario World"
        }"#;

        let media: PlayingMedia = serde_json::from_str(json).expect("decode");
        assert_eq!(media.system_id, "snes");
        assert_eq!(media.system_name, "Super Nintendo");
        assert_eq!(media.media_path, "/games/mario.sfc");
        assert_eq!(media.media_name, "Super Mario World");
        assert!(!media.is_empty());
    }

    #[test]
    fn test_playing_media_empty_sentinel() {
        let empty = PlayingMedia::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.system_id, "");
        assert_eq!(empty.media_name, "");
    }

    #[test]
    fn test_playing_media_missing_fields_default() {
        let media: PlayingMedia = serde_json::from_str(r#"{"systemId": "snes"}"#).expect("decode");
        assert_eq!(media.system_id, "snes");
        assert_eq!(media.media_path, "");
    }

    #[test]
    fn test_playing_media_wrong_type_fails() {
        let result = serde_json::from_str::<PlayingMedia>(r#"{"systemId": 42}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_scanned_token_decode() {
        let json = r#"{
            "uid": "ABC123",
            "text": "**launch:snes/mario.sfc",
            "data": "launch data",
            "scanTime": "2024-01-15T12:00:00Z"
        }"#;

        let token: ScannedToken = serde_json::from_str(json).expect("decode");
        assert_eq!(token.uid, "ABC123");
        assert_eq!(token.text, "**launch:snes/mario.sfc");
        assert_eq!(token.scan_time, "2024-01-15T12:00:00Z");
    }

    #[test]
    fn test_indexing_phase_idle() {
        let status = IndexingStatus {
            indexing: false,
            ..Default::default()
        };
        assert_eq!(status.phase(), IndexingPhase::Idle);
    }

    #[test]
    fn test_indexing_phase_preparing_when_zero_steps() {
        let status = IndexingStatus {
            indexing: true,
            total_steps: 0,
            current_step: 0,
            ..Default::default()
        };
        assert_eq!(status.phase(), IndexingPhase::Preparing);
    }

    #[test]
    fn test_indexing_phase_in_progress() {
        let status = IndexingStatus {
            indexing: true,
            total_steps: 10,
            current_step: 4,
            ..Default::default()
        };
        assert_eq!(status.phase(), IndexingPhase::InProgress);
    }

    #[test]
    fn test_indexing_phase_finalizing_when_steps_equal() {
        let status = IndexingStatus {
            indexing: true,
            total_steps: 10,
            current_step: 10,
            ..Default::default()
        };
        assert_eq!(status.phase(), IndexingPhase::Finalizing);
    }

    #[test]
    fn test_history_decode() {
        let json = r#"{"entries": [
            {"time": "2024-01-15T12:00:00Z", "uid": "ABC", "text": "t", "success": true}
        ]}"#;

        let history: TokenHistory = serde_json::from_str(json).expect("decode");
        assert_eq!(history.entries.len(), 1);
        assert!(history.entries[0].success);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"version": "2.0.1", "platform": "mister", "buildDate": "tomorrow"}"#;
        let info: VersionInfo = serde_json::from_str(json).expect("decode");
        assert_eq!(info.version, "2.0.1");
        assert_eq!(info.platform, "mister");
    }
}
