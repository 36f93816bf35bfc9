//! RFC 3261 transaction timers.
//!
//! The values live in one process-wide profile. Production code never
//! touches it; tests install an accelerated profile with [`set_timers`]
//! (or [`set_base_timers`]) before creating the transactions that should
//! use it. A transaction snapshots the profile when it starts, so changing
//! it later never alters timers that are already running.

use std::cmp;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Estimated round‑trip time (RTT) for message exchanges.
pub const T1: Duration = Duration::from_millis(500);

/// Maximum retransmission interval for INVITE requests.
pub const T2: Duration = Duration::from_secs(4);

/// Maximum duration that a message may remain in the network before being discarded.
pub const T4: Duration = Duration::from_secs(5);

/// Wait time for response retransmissions over unreliable transports.
pub const TIMER_D: Duration = Duration::from_secs(32);

static TIMERS: RwLock<TimerSettings> = RwLock::new(TimerSettings::DEFAULT);

/// A complete set of timer durations used by INVITE client transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub t1: Duration,
    pub t2: Duration,
    pub t4: Duration,
    /// Initial INVITE retransmission interval (UDP only).
    pub timer_a: Duration,
    /// INVITE transaction timeout.
    pub timer_b: Duration,
    /// Wait time for response retransmissions in `Completed`.
    pub timer_d: Duration,
    /// Wait time for 2xx retransmissions in `Accepted` (RFC 6026).
    pub timer_m: Duration,
}

impl TimerSettings {
    /// The RFC 3261 / RFC 6026 defaults.
    pub const DEFAULT: TimerSettings = TimerSettings {
        t1: T1,
        t2: T2,
        t4: T4,
        timer_a: T1,
        timer_b: Duration::from_millis(64 * 500),
        timer_d: TIMER_D,
        timer_m: Duration::from_millis(64 * 500),
    };

    /// Derives every timer from `t1`, `t2` and `t4`.
    ///
    /// Timer D is 64·T1 here, which is exactly the 32 s default when T1 has
    /// its default value, and shrinks along with T1 otherwise.
    pub fn from_base(t1: Duration, t2: Duration, t4: Duration) -> Self {
        Self {
            t1,
            t2,
            t4,
            timer_a: t1,
            timer_b: t1 * 64,
            timer_d: t1 * 64,
            timer_m: t1 * 64,
        }
    }

    /// Timer D for the given transport reliability: zero when reliable.
    pub fn timer_d_for(&self, reliable: bool) -> Duration {
        if reliable {
            Duration::ZERO
        } else {
            self.timer_d
        }
    }

    /// The Timer A interval following `current`: doubled, capped at T2.
    pub fn next_timer_a(&self, current: Duration) -> Duration {
        cmp::min(current * 2, self.t2)
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Returns a snapshot of the current timer profile.
pub fn timers() -> TimerSettings {
    *TIMERS.read().unwrap_or_else(PoisonError::into_inner)
}

/// Replaces the process-wide timer profile.
///
/// Only transactions started after this call see the new values.
pub fn set_timers(settings: TimerSettings) {
    let mut guard = TIMERS.write().unwrap_or_else(PoisonError::into_inner);
    *guard = settings;

    tracing::debug!(?settings, "Transaction timers changed");
}

/// Replaces the timer profile with one derived from `t1`, `t2` and `t4`.
pub fn set_base_timers(t1: Duration, t2: Duration, t4: Duration) {
    set_timers(TimerSettings::from_base(t1, t2, t4));
}

/// Restores the RFC 3261 defaults.
pub fn reset_timers() {
    set_timers(TimerSettings::DEFAULT);
}
