//! # Trace Analysis Module
//!
//! Offline counterpart of the tick loop: runs a recorded sensor trace through
//! the same window and detector and summarises the beats it finds.
//!
//! ## Input
//! A CSV file whose header names a `Value` column. Other columns are ignored.
//! Values may be fractional (normalised exports); they are multiplied by a
//! scale factor and rounded to integer samples before detection.
//!
//! ## Output
//! Candidate indices of confirmed peaks, the mean gap between them in
//! samples, and `rate / mean_gap * 60` as the heart rate.

use crate::clock::Millis;
use crate::detector::{PeakDetector, CANDIDATE_OFFSET};
use crate::error::AnalysisError;
use crate::history::PeakHistory;
use crate::window::Sample;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const VALUE_COLUMN: &str = "Value";
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 1000;

/// Read the `Value` column of a CSV trace file
pub fn load_trace(path: impl AsRef<Path>, scale: f64) -> Result<Vec<Sample>, AnalysisError> {
    let file = File::open(path.as_ref())?;
    parse_trace(BufReader::new(file), scale)
}

pub fn parse_trace(reader: impl BufRead, scale: f64) -> Result<Vec<Sample>, AnalysisError> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(AnalysisError::MissingColumn(VALUE_COLUMN.to_string())),
    };
    let column = header
        .split(',')
        .position(|name| name.trim().trim_matches('"') == VALUE_COLUMN)
        .ok_or_else(|| AnalysisError::MissingColumn(VALUE_COLUMN.to_string()))?;

    let mut samples = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cell = line.split(',').nth(column).unwrap_or("").trim();
        let value: f64 = cell.parse().map_err(|_| AnalysisError::BadValue {
            // Header is line 1
            line: i + 2,
            value: cell.to_string(),
        })?;
        samples.push((value * scale).round() as Sample);
    }

    Ok(samples)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub sample_rate_hz: u32,
    pub samples: usize,
    /// Trace index of each confirmed peak
    pub peaks: Vec<usize>,
    pub mean_interval_samples: Option<f64>,
    pub bpm: Option<f64>,
}

/// Run the detector over `samples` as if they arrived at `sample_rate_hz`
pub fn analyze(samples: &[Sample], sample_rate_hz: u32) -> Result<AnalysisReport, AnalysisError> {
    if sample_rate_hz == 0 {
        return Err(AnalysisError::InvalidRate);
    }

    // Offline runs have no threshold to carry
    let mut detector = PeakDetector::new(0);
    let mut history = PeakHistory::new();
    let mut peaks = Vec::new();

    for (i, &sample) in samples.iter().enumerate() {
        let now = (i as u64 * 1000 / sample_rate_hz as u64) as Millis;
        if detector.tick(sample, now, &mut history) {
            peaks.push(i - CANDIDATE_OFFSET);
        }
    }

    let mean_interval_samples = if peaks.len() >= 2 {
        let total = (peaks[peaks.len() - 1] - peaks[0]) as f64;
        Some(total / (peaks.len() - 1) as f64)
    } else {
        None
    };
    let bpm = mean_interval_samples.map(|gap| sample_rate_hz as f64 / gap * 60.0);

    log::debug!("Analysed {} samples, {} peaks", samples.len(), peaks.len());

    Ok(AnalysisReport {
        sample_rate_hz,
        samples: samples.len(),
        peaks,
        mean_interval_samples,
        bpm,
    })
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples: {} at {} Hz", self.samples, self.sample_rate_hz)?;
        writeln!(f, "Detected peaks: {} {:?}", self.peaks.len(), self.peaks)?;
        match (self.mean_interval_samples, self.bpm) {
            (Some(gap), Some(bpm)) => {
                writeln!(f, "Average interval: {:.2} samples", gap)?;
                write!(f, "Estimated Heart Rate: {:.2} BPM", bpm)
            }
            _ => write!(f, "Estimated Heart Rate: not enough peaks"),
        }
    }
}
