//! Instrument calibration data
//!
//! Every constant that ties counter-domain numbers to physical units lives
//! here, so a different counter (or a re-fitted bias correction) is a JSON
//! file rather than a code change. Missing fields fall back to the values
//! of the reference instrument.

use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_maximum_gate_time_s() -> f64 {
    22e-6
}

fn default_modulation_frequency_cal_factor_hz() -> f64 {
    40848.0222
}

fn default_totalize_correction() -> f64 {
    0.286
}

fn default_uncertainty_floor_hz() -> f64 {
    1000.0
}

fn default_peak_region_cutoff_factor() -> f64 {
    0.1
}

/// Empirical additive bias correction
///
/// Evaluates `Σ terms[i][j] · depth^i · fmod^j` with depth and modulation
/// frequency in Hz; the result is a correction in Hz. An empty polynomial
/// is no correction.
///
/// # Example
/// ```
/// use lasermod_core::calibration::BiasPolynomial;
///
/// // 1 kHz offset plus 2 % of the depth
/// let bias = BiasPolynomial::new(vec![vec![1000.0], vec![0.02]]);
/// assert_eq!(bias.evaluate(1.0e6, 0.0), 21000.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasPolynomial {
    /// Coefficients indexed by `[depth power][frequency power]`
    #[serde(default)]
    pub terms: Vec<Vec<f64>>,
}

impl BiasPolynomial {
    /// Create a polynomial from its coefficient table
    pub fn new(terms: Vec<Vec<f64>>) -> Self {
        Self { terms }
    }

    /// Whether this polynomial applies no correction
    pub fn is_zero(&self) -> bool {
        self.terms.iter().flatten().all(|&c| c == 0.0)
    }

    /// Correction in Hz for the given depth and modulation frequency
    pub fn evaluate(&self, depth_hz: f64, modulation_frequency_hz: f64) -> f64 {
        let mut total = 0.0;
        let mut depth_power = 1.0;
        for row in &self.terms {
            let mut frequency_power = 1.0;
            for &coefficient in row {
                if coefficient != 0.0 {
                    total += coefficient * depth_power * frequency_power;
                }
                frequency_power *= modulation_frequency_hz;
            }
            depth_power *= depth_hz;
        }
        total
    }

    /// Correction depending on depth only (frequency terms ignored)
    pub fn evaluate_depth(&self, depth_hz: f64) -> f64 {
        let mut total = 0.0;
        let mut depth_power = 1.0;
        for row in &self.terms {
            if let Some(&coefficient) = row.first() {
                total += coefficient * depth_power;
            }
            depth_power *= depth_hz;
        }
        total
    }
}

/// Calibration constants of the frequency counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentCalibration {
    /// Longest gate time (s) for which the sinc correction is trusted
    #[serde(default = "default_maximum_gate_time_s")]
    pub maximum_gate_time_s: f64,
    /// Hz per cycle-per-sample: the counter's effective sampling rate
    #[serde(default = "default_modulation_frequency_cal_factor_hz")]
    pub modulation_frequency_cal_factor_hz: f64,
    /// Counts added to every raw reading to undo the totalize bias
    #[serde(default = "default_totalize_correction")]
    pub totalize_correction: f64,
    /// Smallest uncertainty reported for the combined Mpp (Hz)
    #[serde(default = "default_uncertainty_floor_hz")]
    pub uncertainty_floor_hz: f64,
    /// Fraction of the spectral maximum that delimits a peak region
    #[serde(default = "default_peak_region_cutoff_factor")]
    pub peak_region_cutoff_factor: f64,
    /// Bias correction for the statistical Mpp estimate
    #[serde(default)]
    pub stat_bias: BiasPolynomial,
    /// Bias correction for the least-squares Mpp estimate
    #[serde(default)]
    pub lsq_bias: BiasPolynomial,
}

impl Default for InstrumentCalibration {
    fn default() -> Self {
        Self {
            maximum_gate_time_s: default_maximum_gate_time_s(),
            modulation_frequency_cal_factor_hz: default_modulation_frequency_cal_factor_hz(),
            totalize_correction: default_totalize_correction(),
            uncertainty_floor_hz: default_uncertainty_floor_hz(),
            peak_region_cutoff_factor: default_peak_region_cutoff_factor(),
            stat_bias: BiasPolynomial::default(),
            lsq_bias: BiasPolynomial::default(),
        }
    }
}

impl InstrumentCalibration {
    /// Whether `gate_time_s` exceeds the validity bound of the instrument
    pub fn is_gate_time_too_long(&self, gate_time_s: f64) -> bool {
        gate_time_s > self.maximum_gate_time_s
    }

    /// Raw period (samples) to modulation frequency (Hz)
    pub fn modulation_frequency_hz(&self, raw_period: f64) -> f64 {
        self.modulation_frequency_cal_factor_hz / raw_period
    }

    /// Load calibration from a JSON file
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let calibration =
            serde_json::from_str(&contents).map_err(|source| CalibrationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "Loaded calibration");
        Ok(calibration)
    }

    /// Load calibration from a JSON file, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(calibration) => calibration,
            Err(e) => {
                tracing::warn!(error = %e, "Using default calibration");
                Self::default()
            }
        }
    }

    /// Save calibration to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let io_error = |source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(CalibrationError::Encode)?;
        std::fs::write(path, json).map_err(io_error)?;
        tracing::info!(path = %path.display(), "Calibration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_calibration() {
        let cal = InstrumentCalibration::default();
        assert_eq!(cal.maximum_gate_time_s, 22e-6);
        assert_eq!(cal.modulation_frequency_cal_factor_hz, 40848.0222);
        assert_eq!(cal.totalize_correction, 0.286);
        assert_eq!(cal.uncertainty_floor_hz, 1000.0);
        assert_eq!(cal.peak_region_cutoff_factor, 0.1);
        assert!(cal.stat_bias.is_zero());
        assert!(cal.lsq_bias.is_zero());
    }

    #[test]
    fn test_gate_time_bound() {
        let cal = InstrumentCalibration::default();
        assert!(!cal.is_gate_time_too_long(10e-6));
        assert!(!cal.is_gate_time_too_long(22e-6));
        assert!(cal.is_gate_time_too_long(50e-6));
    }

    #[test]
    fn test_modulation_frequency_from_raw_period() {
        let cal = InstrumentCalibration::default();
        assert_relative_eq!(
            cal.modulation_frequency_hz(40848.0222 / 20000.0),
            20000.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_bias_polynomial() {
        let bias = BiasPolynomial::new(vec![vec![1.0, 2.0], vec![3.0]]);
        // 1 + 2 f + 3 d
        assert_relative_eq!(bias.evaluate(10.0, 100.0), 1.0 + 200.0 + 30.0);
        assert_relative_eq!(bias.evaluate_depth(10.0), 1.0 + 30.0);
    }

    #[test]
    fn test_empty_bias_polynomial() {
        let bias = BiasPolynomial::default();
        assert!(bias.is_zero());
        assert_eq!(bias.evaluate(5.0e6, 2.0e4), 0.0);
        assert_eq!(bias.evaluate_depth(5.0e6), 0.0);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"uncertainty_floor_hz": 500.0}"#;
        let cal: InstrumentCalibration = serde_json::from_str(json).unwrap();
        assert_eq!(cal.uncertainty_floor_hz, 500.0);
        assert_eq!(cal.maximum_gate_time_s, 22e-6);
        assert!(cal.lsq_bias.is_zero());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("calibration.json");

        let cal = InstrumentCalibration {
            lsq_bias: BiasPolynomial::new(vec![vec![0.0, 1e-3], vec![0.01]]),
            ..Default::default()
        };
        cal.save(&path).unwrap();

        let loaded = InstrumentCalibration::load(&path).unwrap();
        assert_eq!(loaded, cal);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            InstrumentCalibration::load(&path),
            Err(CalibrationError::Io { .. })
        ));
        assert_eq!(
            InstrumentCalibration::load_or_default(&path),
            InstrumentCalibration::default()
        );
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            InstrumentCalibration::load(&path),
            Err(CalibrationError::Parse { .. })
        ));
    }
}
