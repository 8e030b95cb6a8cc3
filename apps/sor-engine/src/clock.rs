//! Time sources for the routing kernel.
//!
//! Every TTL, cooldown and timeout in the kernel reads the same injected
//! clock so tests can drive time deterministically.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds per second.
pub const NANOS_IN_SECOND: i64 = 1_000_000_000;

/// A wall-clock time source.
///
/// Seconds are fractional Unix epoch seconds; nanoseconds are integral Unix
/// epoch nanoseconds. Both views come from the same underlying source.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall time in fractional Unix seconds.
    fn wall_seconds(&self) -> f64;

    /// Current wall time in Unix nanoseconds.
    fn wall_ns(&self) -> i64;
}

/// System clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_seconds(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn wall_ns(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    ns: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock starting at the given Unix seconds.
    #[must_use]
    pub fn new(start_seconds: f64) -> Self {
        Self {
            ns: AtomicI64::new((start_seconds * NANOS_IN_SECOND as f64) as i64),
        }
    }

    /// Advance the clock by fractional seconds.
    pub fn advance(&self, seconds: f64) {
        self.ns.fetch_add(
            (seconds * NANOS_IN_SECOND as f64) as i64,
            Ordering::SeqCst,
        );
    }

    /// Jump the clock to an absolute Unix-seconds timestamp.
    pub fn set(&self, seconds: f64) {
        self.ns
            .store((seconds * NANOS_IN_SECOND as f64) as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn wall_seconds(&self) -> f64 {
        self.ns.load(Ordering::SeqCst) as f64 / NANOS_IN_SECOND as f64
    }

    fn wall_ns(&self) -> i64 {
        self.ns.load(Ordering::SeqCst)
    }
}

/// Convert Unix nanoseconds to fractional seconds.
#[must_use]
pub fn ns_to_seconds(ns: i64) -> f64 {
    ns as f64 / NANOS_IN_SECOND as f64
}

/// Convert fractional seconds to Unix nanoseconds.
#[must_use]
pub fn seconds_to_ns(seconds: f64) -> i64 {
    (seconds * NANOS_IN_SECOND as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000.0);
        assert!((clock.wall_seconds() - 1_000.0).abs() < 1e-9);
        clock.advance(2.5);
        assert!((clock.wall_seconds() - 1_002.5).abs() < 1e-9);
        assert_eq!(clock.wall_ns(), 1_002_500_000_000);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.wall_seconds();
        let b = clock.wall_seconds();
        assert!(b >= a);
    }
}
