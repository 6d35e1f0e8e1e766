//! Monotonic clock sources for the interpolator.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// A monotonic microsecond clock.
///
/// The interpolator samples this once per public entry point; the source must
/// never move backwards. Wall-clock time is deliberately not used.
pub trait MonotonicClock {
    /// Current monotonic time in microseconds.
    fn now_usecs(&self) -> i64;
}

/// Monotonic clock backed by [`Instant`], measured from construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now_usecs(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }
}

/// Manually-stepped clock for harnesses and tests.
///
/// Time only moves when the harness calls [`ManualClock::advance`] or
/// [`ManualClock::set`], which makes control-loop behavior reproducible.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manual clock starting at `usecs`.
    pub fn starting_at(usecs: i64) -> Self {
        Self {
            now: AtomicI64::new(usecs),
        }
    }

    /// Advance the clock by `usecs` and return the new reading.
    pub fn advance(&self, usecs: i64) -> i64 {
        self.now.fetch_add(usecs, Ordering::SeqCst) + usecs
    }

    /// Jump the clock to an absolute reading.
    pub fn set(&self, usecs: i64) {
        self.now.store(usecs, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now_usecs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
