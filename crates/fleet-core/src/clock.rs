// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling.
//!
//! The Liveness Monitor (§4.C) and Review Queue claim-timeout logic (§4.E)
//! are specified against a single injectable "now" function so that the
//! boundary-behavior tests in §8 are deterministic rather than racing a
//! real clock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A clock that provides the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time.
///
/// Starts at a fixed, arbitrary epoch rather than the real wall clock so
/// that test assertions about elapsed durations don't depend on when the
/// test happened to run.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        // 2024-01-01T00:00:00Z - an arbitrary but fixed start point.
        let epoch = DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_else(Utc::now);
        Self { current: Arc::new(Mutex::new(epoch)) }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut guard = self.current.lock();
        *guard += chrono::Duration::from_std(duration).unwrap_or_default();
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock() = instant;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_monotonically() {
        let clock = FakeClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(60));
        let t1 = clock.now();
        assert!(t1 > t0);
        assert_eq!((t1 - t0).num_seconds(), 60);
    }

    #[test]
    fn fake_clock_set_is_absolute() {
        let clock = FakeClock::new();
        let target = DateTime::from_timestamp(2_000_000_000, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
