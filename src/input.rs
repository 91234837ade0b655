//! Counter recording input
//!
//! A recording is a text file with one counter reading per line. Its base
//! name carries the gate time (first digit run, in µs) and optionally a
//! `_yyyyMMdd_HHmmss` timestamp postfix, e.g. `T010S01_20240315_143000.csv`.

use chrono::{DateTime, NaiveDateTime, Utc};
use lasermod_core::InstrumentCalibration;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension assumed for recordings given without one
pub const DEFAULT_EXTENSION: &str = "csv";

/// Length of the `_yyyyMMdd_HHmmss` postfix
const TIMESTAMP_POSTFIX_LEN: usize = 16;

/// MJD of the Unix epoch
const MJD_UNIX_EPOCH: f64 = 40587.0;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No gate time in file name {0}")]
    NoGateTime(String),

    #[error("No counter readings in {0}")]
    NoReadings(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// A counter recording loaded from disk
#[derive(Debug, Clone)]
pub struct CounterRecording {
    pub path: PathBuf,
    /// File stem, used as the series name in reports
    pub name: String,
    pub gate_time_s: f64,
    pub timestamp: Option<DateTime<Utc>>,
    /// Readings with the totalize correction applied
    pub readings: Vec<f64>,
}

impl CounterRecording {
    /// Read a recording and apply the calibration's totalize correction
    pub fn read(path: &Path, calibration: &InstrumentCalibration) -> Result<Self, InputError> {
        let name = file_stem(path);
        let gate_time_s =
            gate_time_from_name(&name).ok_or_else(|| InputError::NoGateTime(name.clone()))?;

        let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let readings = parse_readings(&text, calibration.totalize_correction);
        if readings.is_empty() {
            return Err(InputError::NoReadings(path.to_path_buf()));
        }

        tracing::info!(
            path = %path.display(),
            readings = readings.len(),
            gate_time_us = gate_time_s * 1e6,
            "Loaded counter recording"
        );

        Ok(Self {
            path: path.to_path_buf(),
            timestamp: timestamp_from_name(&name),
            name,
            gate_time_s,
            readings,
        })
    }

    /// Timestamp as Modified Julian Date
    pub fn timestamp_mjd(&self) -> Option<f64> {
        self.timestamp.map(modified_julian_date)
    }
}

/// File name without directory and extension
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Append `.csv` to a path without extension
pub fn with_default_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(DEFAULT_EXTENSION)
    }
}

/// Parse one reading per line, skipping lines that are not finite numbers
pub fn parse_readings(text: &str, totalize_correction: f64) -> Vec<f64> {
    text.lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value + totalize_correction)
        .collect()
}

/// Gate time in seconds from the first digit run of a name (µs)
pub fn gate_time_from_name(name: &str) -> Option<f64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: String = name[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let micro_seconds: u64 = digits.parse().ok()?;
    Some(micro_seconds as f64 * 1e-6)
}

/// Timestamp from a trailing `_yyyyMMdd_HHmmss` postfix (UTC)
pub fn timestamp_from_name(name: &str) -> Option<DateTime<Utc>> {
    if name.len() <= TIMESTAMP_POSTFIX_LEN {
        return None;
    }
    let postfix = name.get(name.len() - TIMESTAMP_POSTFIX_LEN..)?;
    NaiveDateTime::parse_from_str(postfix, "_%Y%m%d_%H%M%S")
        .ok()
        .map(|t| t.and_utc())
}

/// Modified Julian Date of a UTC instant, at whole-second resolution
pub fn modified_julian_date(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 / 86400.0 + MJD_UNIX_EPOCH
}

/// Recordings (`*.csv`) directly inside `dir`, sorted by path
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>, InputError> {
    if !dir.is_dir() {
        return Err(InputError::NotADirectory(dir.to_path_buf()));
    }
    let io_error = |source| InputError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if !path.is_file() {
            continue;
        }
        let is_recording = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(DEFAULT_EXTENSION));
        if is_recording {
            files.push(path);
        }
    }
    files.sort();

    tracing::debug!(dir = %dir.display(), files = files.len(), "Scanned directory");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    #[test]
    fn test_gate_time_from_name() {
        assert_abs_diff_eq!(gate_time_from_name("T010S01").unwrap(), 10e-6, epsilon = 1e-15);
        assert_abs_diff_eq!(gate_time_from_name("run_20us").unwrap(), 20e-6, epsilon = 1e-15);
        assert!(gate_time_from_name("TxS").is_none());
    }

    #[test]
    fn test_parse_readings() {
        let text = "500\n  501.5 \nheader\n\nNaN\n499\n";
        let readings = parse_readings(text, 0.5);
        assert_eq!(readings, vec![500.5, 502.0, 499.5]);
    }

    #[test]
    fn test_default_extension() {
        assert_eq!(with_default_extension(Path::new("data/T010")), PathBuf::from("data/T010.csv"));
        assert_eq!(with_default_extension(Path::new("T010.txt")), PathBuf::from("T010.txt"));
    }

    #[test]
    fn test_timestamp_from_name() {
        let ts = timestamp_from_name("T010S01_20240315_143000").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap());
        assert!(timestamp_from_name("T010S01").is_none());
        assert!(timestamp_from_name("_20240315_143000").is_none());
        assert!(timestamp_from_name("T010S01_2024031x_143000").is_none());
    }

    #[test]
    fn test_modified_julian_date() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(modified_julian_date(epoch), 40587.0);
        let noon = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert_abs_diff_eq!(modified_julian_date(noon), 51544.5, epsilon = 1e-9);
    }
}
