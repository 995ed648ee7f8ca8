//! # Peak Detection Module
//!
//! Classifies one candidate sample per tick as a heartbeat or not, using only
//! the fixed window of recent samples.
//!
//! ## Heuristic
//! The candidate is the sample `CANDIDATE_OFFSET` ticks behind the newest.
//! With `lo` the window minimum and `span = candidate - lo + 1`, it is a peak
//! when all of these hold:
//! 1. the candidate equals the window maximum (ties count)
//! 2. `(candidate - behind) / span >= RISE_RATIO`, where `behind` is the
//!    sample `LOOKBACK_OFFSET` ticks back: a steep rising edge
//! 3. `(candidate - ahead) / span >= FALL_RATIO`, where `ahead` is the newest
//!    sample: the signal has started to come down again
//!
//! The `+ 1` keeps the denominator positive on a flat window.
//!
//! Flat tops wider than the candidate offset are missed, and so is a rise
//! spread over more than about six samples. Both are properties of the
//! heuristic and are kept as-is.

use crate::clock::Millis;
use crate::history::PeakHistory;
use crate::window::{Sample, SignalWindow};

/// Ticks between the newest sample and the candidate peak
pub const CANDIDATE_OFFSET: usize = 5;
/// Offset of the sample used to measure the rising edge
pub const LOOKBACK_OFFSET: usize = 10;
/// Offset of the sample used to confirm the falling edge
pub const LOOKAHEAD_OFFSET: usize = 0;
/// Minimum share of the candidate's height gained over the rising edge
pub const RISE_RATIO: f32 = 0.8;
/// Minimum share of the candidate's height lost since the candidate
pub const FALL_RATIO: f32 = 0.2;

/// Everything the heuristic looked at for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub candidate: Sample,
    pub behind: Sample,
    pub ahead: Sample,
    pub lo: Sample,
    pub hi: Sample,
    pub ratio_behind: f32,
    pub ratio_ahead: f32,
}

impl Classification {
    /// Evaluate the candidate in the window's current state
    pub fn of(window: &SignalWindow) -> Self {
        let candidate = window.at(CANDIDATE_OFFSET);
        let behind = window.at(LOOKBACK_OFFSET);
        let ahead = window.at(LOOKAHEAD_OFFSET);
        let lo = window.min();
        let hi = window.max();

        // Widened so extreme readings cannot overflow; never below 1
        let span = (candidate as i64 - lo as i64 + 1) as f32;
        let ratio_behind = (candidate as i64 - behind as i64) as f32 / span;
        let ratio_ahead = (candidate as i64 - ahead as i64) as f32 / span;

        Self {
            candidate,
            behind,
            ahead,
            lo,
            hi,
            ratio_behind,
            ratio_ahead,
        }
    }

    pub fn is_window_max(&self) -> bool {
        self.candidate == self.hi
    }

    pub fn is_peak(&self) -> bool {
        self.is_window_max() && self.ratio_behind >= RISE_RATIO && self.ratio_ahead >= FALL_RATIO
    }
}

/// Owns the sample window and feeds confirmed beats into a `PeakHistory`
#[derive(Debug, Clone)]
pub struct PeakDetector {
    window: SignalWindow,
    // TODO: reject candidates below min_height once the sensor's noise floor
    // has been measured; until then it is carried from config only.
    #[allow(dead_code)]
    min_height: Sample,
}

impl PeakDetector {
    pub fn new(min_height: Sample) -> Self {
        Self {
            window: SignalWindow::new(),
            min_height,
        }
    }

    #[cfg(test)]
    pub fn window(&self) -> &SignalWindow {
        &self.window
    }

    /// Push `sample` and classify the candidate it exposes.
    ///
    /// Returns true when a beat was confirmed, after stamping `now` into
    /// `history`. Runs in O(W) and never fails.
    pub fn tick(&mut self, sample: Sample, now: Millis, history: &mut PeakHistory) -> bool {
        self.window.push(sample);
        let classification = Classification::of(&self.window);
        if !classification.is_peak() {
            return false;
        }

        log::debug!(
            "Beat at {} ms: peak={} lo={} rise={:.2} fall={:.2}",
            now,
            classification.candidate,
            classification.lo,
            classification.ratio_behind,
            classification.ratio_ahead
        );
        history.push_peak(now);
        true
    }
}
