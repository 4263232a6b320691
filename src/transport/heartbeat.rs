//! Keep-alive scheduling for one connection.
//!
//! Pure state: the connection task asks when to wake, reports pings sent and
//! acks received, and this object decides when the link counts as silently
//! dead. Tests drive it with fabricated instants; no real timers.
//!
//! Pausing suspends the schedule without closing the socket, for when the
//! host app is backgrounded and the OS may suspend the connection anyway. Pause followed immediately by resume leaves the
//! schedule identical to never having paused.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use crate::config::ConnectionConfig;

// ============================================================================
// Heartbeat
// ============================================================================

/// Keep-alive schedule for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// Gap between pings.
    interval: Duration,

    /// How long an unacknowledged ping may stay outstanding.
    timeout: Duration,

    /// Whether the schedule is suspended.
    paused: bool,

    /// When the last ping was sent, if still awaiting its ack.
    outstanding: Option<Instant>,

    /// When the last ping was sent or the connection established.
    last_beat: Instant,
}

impl Heartbeat {
    /// Creates a schedule anchored at connection establishment.
    #[must_use]
    pub fn new(config: &ConnectionConfig, now: Instant) -> Self {
        Self {
            interval: config.heartbeat_interval,
            timeout: config.heartbeat_timeout,
            paused: false,
            outstanding: None,
            last_beat: now,
        }
    }

    /// Returns `true` while the schedule is suspended.
    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Suspends the schedule. Idempotent.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes the schedule. Idempotent.
    ///
    /// A ping that was outstanding across the pause is re-anchored to `now`
    /// so the device gets a full ack window instead of an instant timeout.
    pub fn resume(&mut self, now: Instant) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if self.outstanding.is_some() {
            self.outstanding = Some(now);
        }
    }

    /// Records a ping written to the socket.
    pub fn on_ping_sent(&mut self, now: Instant) {
        self.outstanding = Some(now);
        self.last_beat = now;
    }

    /// Records liveness: a pong, or any inbound traffic.
    pub fn on_ack(&mut self, now: Instant) {
        self.outstanding = None;
        self.last_beat = now;
    }

    /// Returns `true` if a ping is due at `now`.
    #[inline]
    #[must_use]
    pub fn ping_due(&self, now: Instant) -> bool {
        !self.paused && self.outstanding.is_none() && now >= self.last_beat + self.interval
    }

    /// Returns `true` if an outstanding ping has gone unanswered too long.
    ///
    /// Treated as connection loss by the transport.
    #[inline]
    #[must_use]
    pub fn is_overdue(&self, now: Instant) -> bool {
        match self.outstanding {
            Some(sent) if !self.paused => now >= sent + self.timeout,
            _ => false,
        }
    }

    /// Returns the next instant the connection task must wake for, or `None`
    /// while paused.
    #[must_use]
    pub fn next_wake(&self) -> Option<Instant> {
        if self.paused {
            return None;
        }
        match self.outstanding {
            Some(sent) => Some(sent + self.timeout),
            None => Some(self.last_beat + self.interval),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn heartbeat(now: Instant) -> Heartbeat {
        Heartbeat::new(&ConnectionConfig::new(), now)
    }

    #[test]
    fn test_ping_due_after_interval() {
        let t0 = Instant::now();
        let hb = heartbeat(t0);

        assert!(!hb.ping_due(t0));
        assert!(!hb.ping_due(t0 + Duration::from_secs(14)));
        assert!(hb.ping_due(t0 + Duration::from_secs(15)));
    }

    #[test]
    fn test_ack_clears_outstanding_and_reschedules() {
        let t0 = Instant::now();
        let mut hb = heartbeat(t0);

        hb.on_ping_sent(t0 + Duration::from_secs(15));
        assert!(!hb.ping_due(t0 + Duration::from_secs(16)));

        hb.on_ack(t0 + Duration::from_secs(16));
        assert!(!hb.is_overdue(t0 + Duration::from_secs(60)));
        assert!(hb.ping_due(t0 + Duration::from_secs(31)));
    }

    #[test]
    fn test_overdue_after_timeout() {
        let t0 = Instant::now();
        let mut hb = heartbeat(t0);

        hb.on_ping_sent(t0);
        assert!(!hb.is_overdue(t0 + Duration::from_secs(9)));
        assert!(hb.is_overdue(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_paused_schedule_never_fires() {
        let t0 = Instant::now();
        let mut hb = heartbeat(t0);

        hb.on_ping_sent(t0);
        hb.pause();

        assert!(hb.is_paused());
        assert!(!hb.ping_due(t0 + Duration::from_secs(120)));
        assert!(!hb.is_overdue(t0 + Duration::from_secs(120)));
        assert_eq!(hb.next_wake(), None);
    }

    #[test]
    fn test_pause_resume_pair_is_identity() {
        let t0 = Instant::now();
        let mut hb = heartbeat(t0);
        hb.on_ping_sent(t0);

        let untouched = hb.clone();
        hb.pause();
        hb.resume(t0);
        assert_eq!(hb, untouched);
    }

    #[test]
    fn test_resume_twice_is_noop() {
        let t0 = Instant::now();
        let mut hb = heartbeat(t0);

        hb.pause();
        hb.resume(t0);
        let after_first = hb.clone();
        hb.resume(t0 + Duration::from_secs(5));
        assert_eq!(hb, after_first);
    }

    #[test]
    fn test_resume_reanchors_outstanding_ping() {
        let t0 = Instant::now();
        let mut hb = heartbeat(t0);

        hb.on_ping_sent(t0);
        hb.pause();

        // Long background pause; the old deadline has long passed.
        let t1 = t0 + Duration::from_secs(300);
        hb.resume(t1);

        assert!(!hb.is_overdue(t1 + Duration::from_secs(9)));
        assert!(hb.is_overdue(t1 + Duration::from_secs(10)));
    }

    #[test]
    fn test_next_wake_tracks_ping_then_deadline() {
        let t0 = Instant::now();
        let mut hb = heartbeat(t0);

        assert_eq!(hb.next_wake(), Some(t0 + Duration::from_secs(15)));
        hb.on_ping_sent(t0 + Duration::from_secs(15));
        assert_eq!(hb.next_wake(), Some(t0 + Duration::from_secs(25)));
    }

    proptest! {
        #[test]
        fn prop_pause_resume_pairs_are_identity(pauses in 1usize..8) {
            let t0 = Instant::now();
            let mut hb = heartbeat(t0);
            let untouched = hb.clone();

            for _ in 0..pauses {
                hb.pause();
                hb.resume(t0);
            }
            prop_assert_eq!(hb, untouched);
        }
    }
}
