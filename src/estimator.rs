//! # BPM Estimation Module
//!
//! Turns the peak history into a beats-per-minute reading on a fixed cadence
//! and hands it to a `Reporter`.
//!
//! The reading is `60000 / ((newest - oldest) / (P - 1))`, truncated. Until P
//! real beats have been recorded the oldest slot is still the zero sentinel,
//! so the first readings after boot are far off. In the default `Immediate`
//! mode they are reported anyway; `AwaitFullHistory` holds them back.

use crate::clock::Millis;
use crate::error::ReportError;
use crate::history::{PeakHistory, PEAK_HISTORY_LEN};
use crate::reporter::{Delivery, Reporter};
use serde::{Deserialize, Serialize};

/// Default period between readings
pub const REPORT_INTERVAL_MS: Millis = 5_000;

const MS_PER_MINUTE: f32 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorMode {
    /// Report every interval, startup transient included
    #[default]
    Immediate,
    /// Skip reporting until the history holds only real beats
    AwaitFullHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorState {
    /// Waiting for the interval to elapse
    Idle,
    /// Interval elapsed; the next poll computes and sends
    Reporting,
}

/// One BPM computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub span_ms: Millis,
    pub avg_interval_ms: f32,
    pub bpm: u32,
}

impl Estimate {
    pub fn from_history(history: &PeakHistory) -> Self {
        let span_ms = history.newest().wrapping_sub(history.oldest());
        let avg_interval_ms = span_ms as f32 / (PEAK_HISTORY_LEN - 1) as f32;
        // An all-equal history has no interval to divide by
        let bpm = if avg_interval_ms > 0.0 {
            (MS_PER_MINUTE / avg_interval_ms) as u32
        } else {
            0
        };

        Self {
            span_ms,
            avg_interval_ms,
            bpm,
        }
    }
}

/// What happened in one Reporting pass
#[derive(Debug)]
pub struct ReportCycle {
    pub estimate: Estimate,
    /// `None` when the mode held the reading back
    pub outcome: Option<Result<Delivery, ReportError>>,
}

#[derive(Debug, Clone)]
pub struct BpmEstimator {
    interval_ms: Millis,
    mode: EstimatorMode,
    last_run: Millis,
}

impl BpmEstimator {
    /// Start the first interval at `now`
    pub fn new(interval_ms: Millis, mode: EstimatorMode, now: Millis) -> Self {
        Self {
            interval_ms,
            mode,
            last_run: now,
        }
    }

    pub fn state(&self, now: Millis) -> EstimatorState {
        if now.wrapping_sub(self.last_run) >= self.interval_ms {
            EstimatorState::Reporting
        } else {
            EstimatorState::Idle
        }
    }

    /// Run a Reporting pass if the interval has elapsed.
    ///
    /// The timer restarts at `now` whatever the send outcome.
    pub fn poll(
        &mut self,
        now: Millis,
        history: &PeakHistory,
        reporter: &mut dyn Reporter,
    ) -> Option<ReportCycle> {
        if self.state(now) == EstimatorState::Idle {
            return None;
        }

        let estimate = Estimate::from_history(history);
        log::info!(
            "BPM {} (span {} ms over {} beats, avg {:.1} ms)",
            estimate.bpm,
            estimate.span_ms,
            history.recorded().min(PEAK_HISTORY_LEN),
            estimate.avg_interval_ms
        );

        let outcome = if self.mode == EstimatorMode::AwaitFullHistory && !history.is_full() {
            log::debug!(
                "Holding reading until {} beats are recorded ({} so far)",
                PEAK_HISTORY_LEN,
                history.recorded()
            );
            None
        } else {
            let result = reporter.send(estimate.bpm);
            if let Err(e) = &result {
                log::warn!("Report of {} BPM failed: {}", estimate.bpm, e);
            }
            Some(result)
        };

        self.last_run = now;
        Some(ReportCycle { estimate, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<u32>,
        fail: bool,
    }

    impl Reporter for Recorder {
        fn send(&mut self, bpm: u32) -> Result<Delivery, ReportError> {
            self.sent.push(bpm);
            if self.fail {
                Err(ReportError::Timeout { received: 0 })
            } else {
                Ok(Delivery::Status(200))
            }
        }
    }

    fn history_of(timestamps: &[Millis]) -> PeakHistory {
        let mut history = PeakHistory::new();
        for &t in timestamps {
            history.push_peak(t);
        }
        history
    }

    #[test]
    fn test_even_beats_give_100_bpm() {
        let history = history_of(&[0, 600, 1200, 1800, 2400, 3000, 3600, 4200, 4800, 5400]);
        let estimate = Estimate::from_history(&history);
        assert_eq!(estimate.span_ms, 5400);
        assert_eq!(estimate.avg_interval_ms, 600.0);
        assert_eq!(estimate.bpm, 100);
    }

    #[test]
    fn test_startup_transient_is_out_of_range() {
        // Ten minutes of uptime, only two beats against eight zero slots
        let history = history_of(&[600_000, 600_600]);
        let estimate = Estimate::from_history(&history);
        assert_eq!(estimate.span_ms, 600_600);
        assert!(estimate.bpm < 30, "got {}", estimate.bpm);
    }

    #[test]
    fn test_empty_history_reports_zero() {
        let estimate = Estimate::from_history(&PeakHistory::new());
        assert_eq!(estimate.span_ms, 0);
        assert_eq!(estimate.bpm, 0);
    }

    #[test]
    fn test_span_survives_clock_wrap() {
        let start = u32::MAX - 2_000;
        let stamps: Vec<Millis> = (0..10).map(|k| start.wrapping_add(k * 750)).collect();
        let estimate = Estimate::from_history(&history_of(&stamps));
        assert_eq!(estimate.span_ms, 6750);
        assert_eq!(estimate.bpm, 80);
    }

    #[test]
    fn test_idle_until_interval_elapses() {
        let mut estimator = BpmEstimator::new(REPORT_INTERVAL_MS, EstimatorMode::Immediate, 1_000);
        let history = PeakHistory::new();
        let mut reporter = Recorder::default();

        assert_eq!(estimator.state(5_999), EstimatorState::Idle);
        assert!(estimator.poll(5_999, &history, &mut reporter).is_none());
        assert_eq!(estimator.state(6_000), EstimatorState::Reporting);
        assert!(estimator.poll(6_000, &history, &mut reporter).is_some());
        assert_eq!(reporter.sent, vec![0]);
        assert_eq!(estimator.state(6_000), EstimatorState::Idle);
    }

    #[test]
    fn test_failed_send_still_restarts_timer() {
        let mut estimator = BpmEstimator::new(1_000, EstimatorMode::Immediate, 0);
        let history = history_of(&[0, 600, 1200, 1800, 2400, 3000, 3600, 4200, 4800, 5400]);
        let mut reporter = Recorder {
            fail: true,
            ..Default::default()
        };

        let cycle = estimator.poll(1_500, &history, &mut reporter).unwrap();
        assert!(matches!(cycle.outcome, Some(Err(ReportError::Timeout { .. }))));
        assert!(estimator.poll(2_499, &history, &mut reporter).is_none());
        assert!(estimator.poll(2_500, &history, &mut reporter).is_some());
        assert_eq!(reporter.sent, vec![100, 100]);
    }

    #[test]
    fn test_await_full_history_holds_readings() {
        let mut estimator = BpmEstimator::new(1_000, EstimatorMode::AwaitFullHistory, 0);
        let mut history = history_of(&[300, 900]);
        let mut reporter = Recorder::default();

        let held = estimator.poll(1_000, &history, &mut reporter).unwrap();
        assert!(held.outcome.is_none());
        assert!(reporter.sent.is_empty());

        for k in 2..10 {
            history.push_peak(300 + k * 600);
        }
        let sent = estimator.poll(2_000, &history, &mut reporter).unwrap();
        assert!(matches!(sent.outcome, Some(Ok(Delivery::Status(200)))));
        assert_eq!(reporter.sent, vec![100]);
    }

    #[test]
    fn test_mode_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: EstimatorMode,
        }
        let w: Wrapper = toml::from_str("mode = \"await_full_history\"").unwrap();
        assert_eq!(w.mode, EstimatorMode::AwaitFullHistory);
    }
}
