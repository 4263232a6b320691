//! Reconnect backoff state machine.
//!
//! An explicit per-transport object with a single "next wake time" field
//! instead of ad hoc timer handles. Delay computation is pure, so tests
//! inject a virtual clock and a fixed jitter sample rather than real timers.
//!
//! Each failed attempt doubles the delay up to the cap; a successful
//! connection resets it to the floor. Jitter spreads simultaneous
//! reconnections from many clients recovering at once.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::ConnectionConfig;

// ============================================================================
// Backoff
// ============================================================================

/// Exponential backoff schedule for one transport.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// First delay after a failure.
    initial: Duration,

    /// Upper bound on the delay.
    max: Duration,

    /// Jitter factor (0.2 = ±20%).
    jitter: f64,

    /// Consecutive failed attempts since the last success.
    attempt: u32,

    /// When the pending reconnect attempt fires, if one is scheduled.
    next_wake: Option<Instant>,
}

impl Backoff {
    /// Creates a backoff schedule from connection tuning.
    #[must_use]
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            initial: config.backoff_initial,
            max: config.backoff_max,
            jitter: config.backoff_jitter,
            attempt: 0,
            next_wake: None,
        }
    }

    /// Returns the number of consecutive failed attempts.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the scheduled wake time, if a reconnect is pending.
    #[inline]
    #[must_use]
    pub fn next_wake(&self) -> Option<Instant> {
        self.next_wake
    }

    /// Resets the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_wake = None;
    }

    /// Cancels the pending wake so the next attempt can run immediately.
    ///
    /// Used when the network interface signals it just came back up; the
    /// attempt counter is preserved so a failing device still backs off.
    pub fn cancel_wake(&mut self) {
        self.next_wake = None;
    }

    /// Records a failed attempt and schedules the next wake from `now`.
    ///
    /// Returns the wake time.
    pub fn schedule(&mut self, now: Instant) -> Instant {
        let unit: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
        self.schedule_with(now, unit)
    }

    /// Deterministic variant of [`Backoff::schedule`] for tests.
    ///
    /// `unit` is the jitter sample in `[-1, 1]`.
    pub fn schedule_with(&mut self, now: Instant, unit: f64) -> Instant {
        self.attempt = self.attempt.saturating_add(1);
        let wake = now + self.delay_with(unit);
        self.next_wake = Some(wake);
        wake
    }

    /// Computes the jittered delay for the current attempt count.
    fn delay_with(&self, unit: f64) -> Duration {
        let base = base_delay(self.initial, self.max, self.attempt);
        let factor = 1.0 + self.jitter * unit.clamp(-1.0, 1.0);
        base.mul_f64(factor.max(0.0))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Computes `initial * 2^(attempt-1)` capped at `max`, without overflow.
fn base_delay(initial: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let multiplier: u32 = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    initial.saturating_mul(multiplier).min(max)
}

// ============================================================================
// Tests
// ============================================================================
