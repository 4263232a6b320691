//! Type-safe identifiers for devices and correlated calls.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Backing | Allocation |
//! |------|---------|------------|
//! | [`DeviceId`] | `String` | Supplied by the caller (the device address) |
//! | [`CallId`] | `u64` | Process-wide monotonic counter |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// DeviceId
// ============================================================================

/// Opaque stable identifier for one remote device.
///
/// By convention this is the connection target's address string
/// (e.g. `"192.168.1.100:7497"`). The manager treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device ID from an address string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// CallId
// ============================================================================

/// Global counter backing [`CallId::next`].
///
/// Scoped to the process lifetime and never rewound, so a correlator reset
/// cannot collide with a stale late reply from the device.
static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Correlation identifier for one outbound call.
///
/// Matches an asynchronous response to its originating request. IDs are
/// assigned from a monotonically increasing counter and are unique per
/// outbound call within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    /// Allocates the next call ID from the process-wide counter.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a call ID from a raw value.
    ///
    /// Used when decoding response frames; never for allocation.
    #[inline]
    #[must_use]
    pub const fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
