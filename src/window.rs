//! Sliding window of the most recent raw sensor samples.

use crate::ring::Ring;

/// Raw ADC reading from the pulse sensor
pub type Sample = i32;

/// Number of samples the peak heuristic looks at (W)
pub const WINDOW_LEN: usize = 20;

/// The last `WINDOW_LEN` samples, zero-filled until that many have arrived.
#[derive(Debug, Clone, Default)]
pub struct SignalWindow {
    samples: Ring<Sample, WINDOW_LEN>,
}

impl SignalWindow {
    pub fn new() -> Self {
        Self { samples: Ring::new() }
    }

    pub fn push(&mut self, value: Sample) {
        self.samples.push(value);
    }

    pub fn min(&self) -> Sample {
        self.samples.min()
    }

    pub fn max(&self) -> Sample {
        self.samples.max()
    }

    /// Sample taken `offset` ticks before the newest one.
    pub fn at(&self, offset: usize) -> Sample {
        self.samples.at(offset)
    }
}
