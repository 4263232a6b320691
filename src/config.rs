//! Connection tuning configuration.
//!
//! Backoff, heartbeat, and timeout values are product-tuning choices, so they
//! live here as configuration rather than hard constants inside the
//! transport.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use corelink::ConnectionConfig;
//!
//! let config = ConnectionConfig::new()
//!     .with_backoff(Duration::from_secs(1), Duration::from_secs(30))
//!     .with_heartbeat(Duration::from_secs(15), Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Tuning values for one transport (and the layers above it).
///
/// The defaults are reasonable for a companion app on a home network:
/// 1s backoff floor doubling to a 30s cap with ±20% jitter, a 15s heartbeat
/// with a 10s ack deadline, and a 30s per-call timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// First reconnect delay after a failure.
    pub backoff_initial: Duration,

    /// Upper bound on the reconnect delay.
    pub backoff_max: Duration,

    /// Jitter factor applied to each delay (0.2 = ±20%).
    pub backoff_jitter: f64,

    /// Consecutive failed attempts before the transport surfaces the
    /// `Error` state and stops retrying. `0` retries forever.
    pub max_reconnect_attempts: u32,

    /// Interval between keep-alive pings while connected.
    pub heartbeat_interval: Duration,

    /// How long to wait for a ping acknowledgment before treating the
    /// connection as lost.
    pub heartbeat_timeout: Duration,

    /// Timeout for a single socket connect attempt.
    pub connect_timeout: Duration,

    /// Timeout for one correlated call awaiting its response.
    pub call_timeout: Duration,

    /// Maximum calls queued while disconnected; beyond this, calls fail
    /// immediately with `NotConnected`.
    pub queue_depth: usize,

    /// Minimum gap between identical user-facing toasts.
    pub toast_window: Duration,
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionConfig {
    /// Creates a configuration with default tuning.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            backoff_jitter: 0.2,
            max_reconnect_attempts: 10,
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            queue_depth: 32,
            toast_window: Duration::from_secs(5),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionConfig {
    /// Sets the reconnect backoff floor and cap.
    #[inline]
    #[must_use]
    pub const fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }

    /// Sets the backoff jitter factor (`0.2` = ±20%).
    #[inline]
    #[must_use]
    pub const fn with_jitter(mut self, jitter: f64) -> Self {
        self.backoff_jitter = jitter;
        self
    }

    /// Sets the reconnect attempt budget (`0` = unlimited).
    #[inline]
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the keep-alive interval and ack deadline.
    #[inline]
    #[must_use]
    pub const fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_timeout = timeout;
        self
    }

    /// Sets the socket connect timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-call response timeout.
    #[inline]
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the offline call queue depth.
    #[inline]
    #[must_use]
    pub const fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Sets the toast rate-limit window.
    #[inline]
    #[must_use]
    pub const fn with_toast_window(mut self, window: Duration) -> Self {
        self.toast_window = window;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
