//! Error categories for the estimation pipeline
//!
//! Failures are split by scope so callers can tell which fields are invalid
//! and why:
//! - [`EstimationError`] aborts the analysis of one sample series
//! - [`FitError`] disables a single window's contribution to the aggregate
//! - [`CalibrationError`] covers loading and saving calibration files

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the estimation of one sample series
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Sample series is empty")]
    EmptyInput,

    #[error("Invalid gate time: {0} s")]
    InvalidGateTime(f64),

    #[error("Invalid window size {window_size} for a series of {series_len} samples")]
    InvalidWindowSize {
        window_size: usize,
        series_len: usize,
    },

    #[error("Estimation cancelled")]
    Cancelled,
}

/// Per-window least-squares failures
///
/// These never propagate past the aggregator: a failed window simply
/// contributes no data point to the least-squares statistics.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FitError {
    #[error("Window has {len} samples, at least {min} required")]
    TooFewSamples { len: usize, min: usize },

    #[error("Invalid raw modulation period: {0}")]
    InvalidPeriod(f64),

    #[error("Normal equations are singular")]
    Singular,
}

/// Errors that can occur while reading or writing calibration data
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Failed to access calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse calibration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode calibration data: {0}")]
    Encode(#[source] serde_json::Error),
}
