//! Timestamps of the most recent detected heartbeats.

use crate::clock::Millis;
use crate::ring::Ring;

/// Number of beat timestamps retained (P)
pub const PEAK_HISTORY_LEN: usize = 10;

/// Ring of the last `PEAK_HISTORY_LEN` beat times.
///
/// Starts zero-filled. A zero is indistinguishable from a beat at time zero,
/// so until `is_full()` the oldest entry may be that sentinel and any span
/// computed from it is inflated.
#[derive(Debug, Clone, Default)]
pub struct PeakHistory {
    timestamps: Ring<Millis, PEAK_HISTORY_LEN>,
    recorded: usize,
}

impl PeakHistory {
    pub fn new() -> Self {
        Self {
            timestamps: Ring::new(),
            recorded: 0,
        }
    }

    pub fn push_peak(&mut self, timestamp_ms: Millis) {
        self.timestamps.push(timestamp_ms);
        self.recorded = self.recorded.saturating_add(1);
    }

    pub fn newest(&self) -> Millis {
        self.timestamps.newest()
    }

    pub fn oldest(&self) -> Millis {
        self.timestamps.oldest()
    }

    /// Beats recorded since construction
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// True once every slot holds a real beat rather than the zero sentinel
    pub fn is_full(&self) -> bool {
        self.recorded >= PEAK_HISTORY_LEN
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Millis> + '_ {
        self.timestamps.iter()
    }
}
