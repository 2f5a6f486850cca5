//! Time-unit source for the governance engine.
//!
//! Conviction accrues and decays per discrete time-unit (a block height on
//! the host ledger). The engine never reads the wall clock directly; it
//! asks a [`Clock`] so that embedders can supply block heights and tests
//! can drive time explicitly.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time-unit.
pub trait Clock: Send + Sync {
    /// The current time-unit.
    fn now(&self) -> u64;
}

/// Wall-clock based time source, one time-unit per second.
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // Pre-1970 system clocks are not a supported configuration.
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Manually advanced time source for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at the given time-unit.
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Set the current time-unit.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advance the clock by a number of time-units.
    pub fn advance(&self, units: u64) {
        self.now.fetch_add(units, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now(), 100);

        clock.advance(10);
        assert_eq!(clock.now(), 110);

        clock.set(50);
        assert_eq!(clock.now(), 50);
    }

    #[test]
    fn test_system_clock_monotonic_enough() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a > 1_600_000_000); // sometime after 2020
    }
}
