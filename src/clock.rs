//! Injectable time sources for deterministic control timing.
//!
//! All timeout logic in the tracker is wall-clock based via a monotonic
//! millisecond counter. Tests drive a [`ManualClock`] so tick progression
//! can be simulated exactly; production code uses [`MonotonicClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic millisecond time source
pub trait TimeSource {
    /// Milliseconds elapsed since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}

/// System time source backed by `std::time::Instant`
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually advanced time source for tests
///
/// Cloning shares the underlying counter, so a test can hold one handle
/// while the tracker owns another.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Advance the clock by `delta_ms` milliseconds
    pub fn advance(&self, delta_ms: u64) {
        self.now.set(self.now.get() + delta_ms);
    }

    /// Set the clock to an absolute time
    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_ms(), 100);
        clock.advance(20);
        assert_eq!(clock.now_ms(), 120);

        let shared = clock.clone();
        shared.advance(20);
        assert_eq!(clock.now_ms(), 140);
    }

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
