//! # Error Types Module
//!
//! Centralized error handling for pulse-relay.
//! Detection and estimation never fail, so every error here comes from the
//! outer shell: the network, the config file, or a recorded trace.
//!
//! ## Error Types
//! - `ReportError`: transient failures delivering a reading to the server
//! - `ConfigError`: configuration file I/O and parsing errors
//! - `AnalysisError`: problems loading or analysing a recorded trace
//!
//! ## Policy
//! A `ReportError` is logged and dropped. The next reporting interval tries
//! again with a fresh reading; nothing is retried within the same cycle.

use std::fmt;

/// Errors that can occur while delivering a reading
#[derive(Debug)]
pub enum ReportError {
    /// Could not open a connection to the server
    Connect(reqwest::Error),
    /// Request was sent but no usable response head came back
    Request(reqwest::Error),
    /// Connection failed while the body was streaming in
    Body(reqwest::Error),
    /// No data arrived for a full inactivity timeout
    Timeout { received: usize },
    /// Reading did not fit the fixed-size request path
    PathOverflow(u32),
    /// Failed to set up the runtime, client or worker thread
    Runtime(String),
    /// Background uploader is still busy with earlier readings
    QueueFull,
    /// Background uploader has stopped
    WorkerGone,
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Connect(e) => {
                write!(f, "Connect failed: {}", e)
            }
            ReportError::Request(e) => {
                write!(f, "Getting response failed: {}", e)
            }
            ReportError::Body(e) => {
                write!(f, "Connection error while reading body: {}", e)
            }
            ReportError::Timeout { received } => {
                write!(f, "Timed out waiting for data after {} bytes", received)
            }
            ReportError::PathOverflow(bpm) => {
                write!(f, "Request path for {} BPM does not fit", bpm)
            }
            ReportError::Runtime(msg) => {
                write!(f, "Failed to set up reporter: {}", msg)
            }
            ReportError::QueueFull => {
                write!(f, "Uploader busy, reading dropped")
            }
            ReportError::WorkerGone => {
                write!(f, "Uploader thread has stopped")
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Connect(e) | ReportError::Request(e) | ReportError::Body(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur while loading or analysing a trace
#[derive(Debug)]
pub enum AnalysisError {
    /// Failed to read the trace file
    Io(std::io::Error),
    /// Header has no column with this name
    MissingColumn(String),
    /// A cell in the value column is not a number
    BadValue { line: usize, value: String },
    /// Sample rate must be positive
    InvalidRate,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Io(e) => {
                write!(f, "Failed to read trace: {}", e)
            }
            AnalysisError::MissingColumn(name) => {
                write!(f, "CSV must contain a '{}' column", name)
            }
            AnalysisError::BadValue { line, value } => {
                write!(f, "Line {}: '{}' is not a number", line, value)
            }
            AnalysisError::InvalidRate => {
                write!(f, "Sample rate must be greater than zero")
            }
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(e: std::io::Error) -> Self {
        AnalysisError::Io(e)
    }
}
