//! Sample sources feeding the tick loop.
//!
//! The real sensor sits behind an ADC on the device; on a host the loop is
//! driven by a synthetic waveform or a recorded trace instead.

use crate::window::Sample;

/// Supplies the latest raw reading, once per tick
pub trait SampleSource {
    fn read(&mut self) -> Sample;
}

/// Ticks from baseline to apex
const PULSE_RISE_TICKS: u32 = 5;
/// Ticks from apex back to baseline
const PULSE_FALL_TICKS: u32 = 10;

/// Deterministic pulse train: a sharp rise, a slower fall, then baseline
/// until the next beat.
#[derive(Debug, Clone)]
pub struct SyntheticPulse {
    period_ticks: u32,
    phase: u32,
    baseline: Sample,
    amplitude: Sample,
}

impl SyntheticPulse {
    /// Pulse train at `bpm` when read every `tick_ms`.
    ///
    /// The period is rounded down to whole ticks and never shorter than one
    /// full pulse.
    pub fn new(bpm: u32, tick_ms: u32, baseline: Sample, amplitude: Sample) -> Self {
        let ticks_per_minute = 60_000 / tick_ms.max(1);
        let period_ticks = (ticks_per_minute / bpm.max(1)).max(PULSE_RISE_TICKS + PULSE_FALL_TICKS + 1);
        Self {
            period_ticks,
            phase: 0,
            baseline,
            amplitude,
        }
    }

    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    fn level(&self, phase: u32) -> Sample {
        let a = self.amplitude as i64;
        let offset = if phase <= PULSE_RISE_TICKS {
            a * phase as i64 / PULSE_RISE_TICKS as i64
        } else if phase <= PULSE_RISE_TICKS + PULSE_FALL_TICKS {
            let down = (phase - PULSE_RISE_TICKS) as i64;
            a - a * down / PULSE_FALL_TICKS as i64
        } else {
            0
        };
        (self.baseline as i64 + offset) as Sample
    }
}

impl SampleSource for SyntheticPulse {
    fn read(&mut self) -> Sample {
        let value = self.level(self.phase);
        self.phase = (self.phase + 1) % self.period_ticks;
        value
    }
}

/// Plays back a recorded trace, starting over at the end
#[derive(Debug, Clone)]
pub struct ReplaySource {
    samples: Vec<Sample>,
    pos: usize,
}

impl ReplaySource {
    /// `None` for an empty trace
    pub fn new(samples: Vec<Sample>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        Some(Self { samples, pos: 0 })
    }
}

impl SampleSource for ReplaySource {
    fn read(&mut self) -> Sample {
        let value = self.samples[self.pos];
        self.pos = (self.pos + 1) % self.samples.len();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_period_from_bpm() {
        assert_eq!(SyntheticPulse::new(100, 20, 0, 100).period_ticks(), 30);
        assert_eq!(SyntheticPulse::new(60, 20, 0, 100).period_ticks(), 50);
        // Too fast to fit a whole pulse
        assert_eq!(SyntheticPulse::new(1000, 20, 0, 100).period_ticks(), 16);
    }

    #[test]
    fn test_synthetic_shape() {
        let mut pulse = SyntheticPulse::new(100, 20, 1800, 1200);
        let one_period: Vec<Sample> = (0..30).map(|_| pulse.read()).collect();

        assert_eq!(one_period[0], 1800);
        assert_eq!(one_period[5], 3000);
        assert_eq!(one_period[10], 2400);
        assert_eq!(one_period[15], 1800);
        assert!(one_period[16..].iter().all(|&v| v == 1800));
        assert_eq!(one_period.iter().filter(|&&v| v == 3000).count(), 1);
        // Next period starts over
        assert_eq!(pulse.read(), 1800);
        assert_eq!(pulse.read(), 2040);
    }

    #[test]
    fn test_replay_loops() {
        let mut replay = ReplaySource::new(vec![1, 2, 3]).unwrap();
        let seen: Vec<Sample> = (0..7).map(|_| replay.read()).collect();
        assert_eq!(seen, vec![1, 2, 3, 1, 2, 3, 1]);
        assert!(ReplaySource::new(Vec::new()).is_none());
    }
}
