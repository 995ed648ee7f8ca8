//! Millisecond time base shared by the detector and the estimator.
//!
//! Time is a wrapping `u32` like a microcontroller's `millis()` counter. All
//! interval math uses `wrapping_sub`, so spans stay correct across the wrap
//! at roughly 49.7 days of uptime.

use std::time::Instant;

/// Milliseconds since some fixed origin, wrapping at `u32::MAX`
pub type Millis = u32;

pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Process uptime clock
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        // Truncation is the wrap
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock for simulations
#[cfg(test)]
pub struct ManualClock {
    now: std::cell::Cell<Millis>,
}

#[cfg(test)]
impl ManualClock {
    pub fn starting_at(now: Millis) -> Self {
        Self {
            now: std::cell::Cell::new(now),
        }
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_wraps() {
        let clock = ManualClock::starting_at(u32::MAX - 10);
        let start = clock.now_ms();
        clock.advance(30);
        assert_eq!(clock.now_ms(), 19);
        assert_eq!(clock.now_ms().wrapping_sub(start), 30);
    }

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(clock.now_ms().wrapping_sub(a) >= 5);
    }
}
