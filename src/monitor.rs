//! # Monitor Module
//!
//! Ties detection and estimation together and drives them from a fixed tick.
//!
//! ## Per tick
//! 1. read one sample from the source
//! 2. push it through the peak detector, which may stamp a beat into history
//! 3. if the reporting interval has elapsed, estimate BPM and report it
//!
//! All state is owned by `Monitor` and touched only from the thread calling
//! `tick`. The reporter decides whether delivery blocks; the device loop uses
//! the queued uploader so it never does.

use crate::clock::{Clock, Millis};
use crate::config::Config;
use crate::detector::PeakDetector;
use crate::estimator::{BpmEstimator, EstimatorMode, ReportCycle};
use crate::history::PeakHistory;
use crate::reporter::Reporter;
use crate::source::SampleSource;
use crate::window::Sample;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// What one tick produced
#[derive(Debug)]
pub struct TickOutcome {
    pub beat: bool,
    pub report: Option<ReportCycle>,
}

pub struct Monitor {
    detector: PeakDetector,
    history: PeakHistory,
    estimator: BpmEstimator,
}

impl Monitor {
    pub fn new(min_height: Sample, interval_ms: Millis, mode: EstimatorMode, now: Millis) -> Self {
        Self {
            detector: PeakDetector::new(min_height),
            history: PeakHistory::new(),
            estimator: BpmEstimator::new(interval_ms, mode, now),
        }
    }

    pub fn from_config(config: &Config, now: Millis) -> Self {
        Self::new(
            config.detector.min_height,
            config.reporting.interval_ms,
            config.reporting.mode,
            now,
        )
    }

    #[cfg(test)]
    pub fn history(&self) -> &PeakHistory {
        &self.history
    }

    pub fn tick(&mut self, sample: Sample, now: Millis, reporter: &mut dyn Reporter) -> TickOutcome {
        let beat = self.detector.tick(sample, now, &mut self.history);
        let report = self.estimator.poll(now, &self.history, reporter);
        TickOutcome { beat, report }
    }
}

/// Totals for one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub beats: u64,
    /// Reporting passes, held-back readings included
    pub readings: u64,
    /// Readings the reporter refused or failed to deliver
    pub failed: u64,
    pub last_bpm: Option<u32>,
}

impl RunSummary {
    fn record(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        if outcome.beat {
            self.beats += 1;
        }
        if let Some(cycle) = outcome.report {
            self.readings += 1;
            self.last_bpm = Some(cycle.estimate.bpm);
            if let Some(Err(_)) = cycle.outcome {
                self.failed += 1;
            }
        }
    }
}

/// Drive `monitor` every `tick` until `should_stop` is set.
///
/// Ticks are scheduled against absolute deadlines so per-tick work does not
/// accumulate drift. A tick that overruns its slot is logged and the schedule
/// restarts from now instead of bursting to catch up.
pub fn run(
    monitor: &mut Monitor,
    source: &mut dyn SampleSource,
    clock: &dyn Clock,
    reporter: &mut dyn Reporter,
    tick: Duration,
    should_stop: &AtomicBool,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut deadline = Instant::now();

    while !should_stop.load(Ordering::Relaxed) {
        let sample = source.read();
        summary.record(monitor.tick(sample, clock.now_ms(), reporter));

        deadline += tick;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        } else {
            log::warn!(
                "Tick {} overran its {:?} slot by {:?}",
                summary.ticks,
                tick,
                now - deadline
            );
            deadline = now;
        }
    }

    log::info!(
        "Monitor stopped after {} ticks: {} beats, {} readings ({} not delivered), last BPM {:?}",
        summary.ticks,
        summary.beats,
        summary.readings,
        summary.failed,
        summary.last_bpm
    );
    summary
}
