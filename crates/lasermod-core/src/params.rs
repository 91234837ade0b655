//! Conversion of counter-domain results into physical parameters
//!
//! Readings are counts per gate interval, so dividing by the gate time gives
//! Hz. Modulation depths are corrected for the box-car averaging of the
//! gate (the sinc factor) and for the empirical bias of each estimator; the
//! two Mpp estimates are then combined with a dark-uncertainty model.

use crate::analysis::WindowedAggregate;
use crate::calibration::InstrumentCalibration;
use crate::stats::SeriesStatistics;
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;

/// Non-fatal condition that invalidates some fields of a [`ParameterSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Gate time above the instrument bound; sinc-corrected fields are NaN
    GateTimeTooLong,
    /// Dual analysis found a single spectral peak and fell back to one tone
    SingleModulationDetected,
    /// No bin of the given tone's region exceeded the cutoff
    NoSpectralPeak { tone: usize },
    /// Raw period taken from zero crossings instead of the spectrum
    PeriodFromZeroCrossings,
    /// No window produced a least-squares fit
    NoUsableWindows,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::GateTimeTooLong => write!(f, "gate time too long, some parameters invalid"),
            Warning::SingleModulationDetected => {
                write!(f, "single modulation detected, second tone ignored")
            }
            Warning::NoSpectralPeak { tone } => write!(f, "no spectral peak found for tone {tone}"),
            Warning::PeriodFromZeroCrossings => {
                write!(f, "modulation period estimated from zero crossings")
            }
            Warning::NoUsableWindows => write!(f, "no window could be fitted"),
        }
    }
}

/// Where a raw modulation period came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PeriodSource {
    /// Dominant spectral bin
    Spectral { raw_frequency: usize },
    /// Supplied by the caller
    Supplied,
    /// Mean zero-crossing spacing
    ZeroCrossings,
    /// No estimate available
    Undefined,
}

/// Raw period of one tone, in samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTone {
    pub raw_period: f64,
    pub source: PeriodSource,
}

/// Physical parameters of one modulation tone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneParameters {
    pub source: PeriodSource,
    /// Modulation period in counter samples
    pub raw_period: f64,
    pub modulation_frequency_hz: f64,
    pub modulation_period_s: f64,
    /// Gate-time correction applied to this tone's depth
    pub sinc_correction: f64,
    pub mpp_lsq_hz: f64,
    pub mpp_lsq_dispersion_hz: f64,
}

/// Final result of estimating one counter series
///
/// Undefined quantities are NaN (`null` in JSON); [`ParameterSet::warnings`]
/// says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSet {
    /// Series name, usually the input file stem
    pub name: String,
    pub gate_time_s: f64,
    /// Frequency resolution `1 / gate time`
    pub resolution_hz: f64,
    pub window_size: usize,
    pub windows: usize,
    pub failed_fits: usize,
    pub sample_count: usize,
    pub min_reading: f64,
    pub max_reading: f64,

    /// Mean of the whole series
    pub carrier_total_hz: f64,
    pub carrier_total_dispersion_hz: f64,
    /// Mean of the per-window means
    pub carrier_stat_hz: f64,
    pub carrier_stat_dispersion_hz: f64,
    /// Mean of the per-window least-squares constants
    pub carrier_lsq_hz: f64,
    pub carrier_lsq_dispersion_hz: f64,

    /// One entry per analysed tone
    pub tones: Vec<ToneParameters>,

    /// Statistical Mpp (single tone only)
    pub mpp_stat_hz: f64,
    pub mpp_stat_dispersion_hz: f64,
    /// Mean of the statistical and least-squares Mpp (single tone only)
    pub mpp_hz: f64,
    pub mpp_uncertainty_hz: f64,

    pub warnings: Vec<Warning>,
}

impl ParameterSet {
    /// Attach a series name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether two tones were analysed
    pub fn is_dual(&self) -> bool {
        self.tones.len() == 2
    }

    pub fn is_gate_time_too_long(&self) -> bool {
        self.warnings.contains(&Warning::GateTimeTooLong)
    }

    pub fn is_single_modulation(&self) -> bool {
        self.warnings.contains(&Warning::SingleModulationDetected)
    }

    /// First (or only) tone
    pub fn primary_tone(&self) -> Option<&ToneParameters> {
        self.tones.first()
    }

    /// Least-squares Mpp of the first tone (NaN if none)
    pub fn mpp_lsq_hz(&self) -> f64 {
        self.primary_tone().map_or(f64::NAN, |t| t.mpp_lsq_hz)
    }

    /// Least-squares Mpp dispersion of the first tone (NaN if none)
    pub fn mpp_lsq_dispersion_hz(&self) -> f64 {
        self.primary_tone().map_or(f64::NAN, |t| t.mpp_lsq_dispersion_hz)
    }

    /// Modulation frequency of the first tone (NaN if none)
    pub fn modulation_frequency_hz(&self) -> f64 {
        self.primary_tone().map_or(f64::NAN, |t| t.modulation_frequency_hz)
    }
}

/// Gate-time correction `|xπ / sin(xπ)|` with `x = gate / period`
///
/// Returns 1 for `x = 0` and NaN when the gate time exceeds
/// `maximum_gate_time_s`.
///
/// # Example
/// ```
/// use lasermod_core::params::sinc_correction_factor;
///
/// let factor = sinc_correction_factor(10e-6, 20e-6, 22e-6);
/// assert!((factor - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
/// assert!(sinc_correction_factor(30e-6, 1.0, 22e-6).is_nan());
/// ```
pub fn sinc_correction_factor(
    gate_time_s: f64,
    modulation_period_s: f64,
    maximum_gate_time_s: f64,
) -> f64 {
    if gate_time_s > maximum_gate_time_s {
        return f64::NAN;
    }
    let x = gate_time_s / modulation_period_s;
    if x == 0.0 {
        return 1.0;
    }
    let arg = x * PI;
    (arg / arg.sin()).abs()
}

/// Standard uncertainty of the mean of two Mpp estimates plus dark uncertainty
///
/// NaN propagates; otherwise the result is at least `floor_hz`.
pub fn combined_uncertainty(
    mpp_stat: f64,
    dispersion_stat: f64,
    mpp_lsq: f64,
    dispersion_lsq: f64,
    floor_hz: f64,
) -> f64 {
    let dx = (mpp_stat - mpp_lsq).abs();
    let var_sum = dispersion_stat * dispersion_stat + dispersion_lsq * dispersion_lsq;
    if dx.is_nan() || var_sum.is_nan() {
        return f64::NAN;
    }
    let dark = (dx * dx / 4.0 - var_sum).max(0.0);
    (var_sum / 2.0 + dark).sqrt().max(floor_hz)
}

/// Builds a [`ParameterSet`] from the counter-domain stage outputs
pub struct ParameterAssembler<'a> {
    calibration: &'a InstrumentCalibration,
    gate_time_s: f64,
}

impl<'a> ParameterAssembler<'a> {
    pub fn new(calibration: &'a InstrumentCalibration, gate_time_s: f64) -> Self {
        Self {
            calibration,
            gate_time_s,
        }
    }

    /// Counts per gate interval to Hz
    pub fn to_hz(&self, counts: f64) -> f64 {
        counts / self.gate_time_s
    }

    /// Sinc factor for a modulation period in seconds
    pub fn sinc_correction(&self, modulation_period_s: f64) -> f64 {
        sinc_correction_factor(
            self.gate_time_s,
            modulation_period_s,
            self.calibration.maximum_gate_time_s,
        )
    }

    /// Corrected statistical Mpp from a depth in counts
    pub fn mpp_stat(&self, depth_counts: f64, sinc: f64) -> f64 {
        let depth_hz = self.to_hz(depth_counts);
        depth_hz * sinc + self.calibration.stat_bias.evaluate_depth(depth_hz)
    }

    /// Corrected least-squares Mpp from a depth in counts
    pub fn mpp_lsq(&self, depth_counts: f64, sinc: f64, modulation_frequency_hz: f64) -> f64 {
        let depth_hz = self.to_hz(depth_counts);
        depth_hz * sinc
            + self
                .calibration
                .lsq_bias
                .evaluate(depth_hz, modulation_frequency_hz)
    }

    /// Assemble the parameter set
    ///
    /// `tones` must hold one entry per tone fitted by the aggregator.
    pub fn assemble(
        &self,
        series: &SeriesStatistics,
        tones: &[RawTone],
        aggregate: &WindowedAggregate,
        mut warnings: Vec<Warning>,
    ) -> ParameterSet {
        if self.calibration.is_gate_time_too_long(self.gate_time_s) {
            tracing::warn!(
                gate_time_s = self.gate_time_s,
                maximum_gate_time_s = self.calibration.maximum_gate_time_s,
                "Gate time too long, some parameters invalid"
            );
            warnings.push(Warning::GateTimeTooLong);
        }

        let tone_parameters: Vec<ToneParameters> = tones
            .iter()
            .zip(&aggregate.depth_lsq)
            .map(|(tone, depth)| {
                let modulation_frequency_hz =
                    self.calibration.modulation_frequency_hz(tone.raw_period);
                let modulation_period_s = 1.0 / modulation_frequency_hz;
                let sinc_correction = self.sinc_correction(modulation_period_s);
                ToneParameters {
                    source: tone.source,
                    raw_period: tone.raw_period,
                    modulation_frequency_hz,
                    modulation_period_s,
                    sinc_correction,
                    mpp_lsq_hz: self.mpp_lsq(depth.mean, sinc_correction, modulation_frequency_hz),
                    mpp_lsq_dispersion_hz: self.to_hz(depth.std_dev),
                }
            })
            .collect();

        let (mpp_stat_hz, mpp_stat_dispersion_hz, mpp_hz, mpp_uncertainty_hz) =
            match tone_parameters.as_slice() {
                [tone] => {
                    let mpp_stat = self.mpp_stat(aggregate.depth_stat.mean, tone.sinc_correction);
                    let dispersion_stat = self.to_hz(aggregate.depth_stat.std_dev);
                    let uncertainty = combined_uncertainty(
                        mpp_stat,
                        dispersion_stat,
                        tone.mpp_lsq_hz,
                        tone.mpp_lsq_dispersion_hz,
                        self.calibration.uncertainty_floor_hz,
                    );
                    (
                        mpp_stat,
                        dispersion_stat,
                        0.5 * (mpp_stat + tone.mpp_lsq_hz),
                        uncertainty,
                    )
                }
                _ => (f64::NAN, f64::NAN, f64::NAN, f64::NAN),
            };

        ParameterSet {
            name: String::new(),
            gate_time_s: self.gate_time_s,
            resolution_hz: 1.0 / self.gate_time_s,
            window_size: aggregate.window_size,
            windows: aggregate.windows,
            failed_fits: aggregate.failed_fits,
            sample_count: series.len(),
            min_reading: series.min(),
            max_reading: series.max(),
            carrier_total_hz: self.to_hz(series.mean()),
            carrier_total_dispersion_hz: self.to_hz(series.std_dev()),
            carrier_stat_hz: self.to_hz(aggregate.carrier_stat.mean),
            carrier_stat_dispersion_hz: self.to_hz(aggregate.carrier_stat.std_dev),
            carrier_lsq_hz: self.to_hz(aggregate.carrier_lsq.mean),
            carrier_lsq_dispersion_hz: self.to_hz(aggregate.carrier_lsq.std_dev),
            tones: tone_parameters,
            mpp_stat_hz,
            mpp_stat_dispersion_hz,
            mpp_hz,
            mpp_uncertainty_hz,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::BiasPolynomial;
    use crate::stats::Summary;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn summary(mean: f64, std_dev: f64) -> Summary {
        Summary {
            count: 50,
            mean,
            std_dev,
        }
    }

    fn aggregate(depth_stat: f64, depth_lsq: Vec<f64>) -> WindowedAggregate {
        WindowedAggregate {
            window_size: 1000,
            windows: 50,
            failed_fits: 0,
            carrier_stat: summary(500.0, 0.1),
            depth_stat: summary(depth_stat, 0.02),
            carrier_lsq: summary(500.0, 0.1),
            depth_lsq: depth_lsq.into_iter().map(|d| summary(d, 0.02)).collect(),
        }
    }

    fn spectral_tone(raw_period: f64) -> RawTone {
        RawTone {
            raw_period,
            source: PeriodSource::Spectral { raw_frequency: 1 },
        }
    }

    #[test]
    fn test_sinc_factor_small_argument() {
        assert_eq!(sinc_correction_factor(10e-6, f64::INFINITY, 22e-6), 1.0);
        assert_abs_diff_eq!(sinc_correction_factor(1e-9, 1.0, 22e-6), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sinc_factor_half_period() {
        assert_abs_diff_eq!(
            sinc_correction_factor(10e-6, 20e-6, 22e-6),
            PI / 2.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_sinc_factor_gate_too_long() {
        assert!(sinc_correction_factor(23e-6, 1.0, 22e-6).is_nan());
        assert!(!sinc_correction_factor(22e-6, 1.0, 22e-6).is_nan());
    }

    #[test]
    fn test_sinc_factor_undefined_period() {
        assert!(sinc_correction_factor(10e-6, f64::NAN, 22e-6).is_nan());
    }

    #[test]
    fn test_uncertainty_consistent_estimates() {
        let u = combined_uncertainty(5e6, 2000.0, 5e6, 2000.0, 1000.0);
        assert_relative_eq!(u, 2000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_uncertainty_dark_component() {
        // dx = 10 kHz, varSum = 2e6, dark = 25e6 - 2e6
        let u = combined_uncertainty(5.01e6, 1000.0, 5.0e6, 1000.0, 1000.0);
        assert_relative_eq!(u, 24.0e6f64.sqrt(), max_relative = 1e-9);
    }

    #[test]
    fn test_uncertainty_floor() {
        let u = combined_uncertainty(5e6, 10.0, 5e6, 10.0, 1000.0);
        assert_eq!(u, 1000.0);
    }

    #[test]
    fn test_uncertainty_nan_propagates() {
        assert!(combined_uncertainty(5e6, f64::NAN, 5e6, 10.0, 1000.0).is_nan());
        assert!(combined_uncertainty(f64::NAN, 10.0, 5e6, 10.0, 1000.0).is_nan());
    }

    #[test]
    fn test_assemble_single_tone() {
        let calibration = InstrumentCalibration::default();
        let gate = 10e-6;
        let assembler = ParameterAssembler::new(&calibration, gate);
        let series = SeriesStatistics::from_samples(&[499.0, 500.0, 501.0]).unwrap();
        // 50 samples per period -> fmod = cal / 50
        let tones = [spectral_tone(50.0)];
        let params = assembler.assemble(&series, &tones, &aggregate(50.0, vec![48.0]), vec![]);

        let fmod = calibration.modulation_frequency_cal_factor_hz / 50.0;
        let sinc = sinc_correction_factor(gate, 1.0 / fmod, calibration.maximum_gate_time_s);
        assert!(sinc > 1.0);

        assert_eq!(params.sample_count, 3);
        assert_eq!(params.window_size, 1000);
        assert_relative_eq!(params.resolution_hz, 1e5, max_relative = 1e-12);
        assert_relative_eq!(params.carrier_total_hz, 50e6, max_relative = 1e-12);
        assert_relative_eq!(params.carrier_lsq_hz, 50e6, max_relative = 1e-12);
        assert_relative_eq!(params.modulation_frequency_hz(), fmod, max_relative = 1e-12);
        assert_relative_eq!(params.mpp_stat_hz, 5e6 * sinc, max_relative = 1e-12);
        assert_relative_eq!(params.mpp_lsq_hz(), 4.8e6 * sinc, max_relative = 1e-12);
        assert_relative_eq!(params.mpp_hz, 4.9e6 * sinc, max_relative = 1e-12);
        assert!(params.mpp_uncertainty_hz >= calibration.uncertainty_floor_hz);
        assert!(params.warnings.is_empty());
    }

    #[test]
    fn test_assemble_applies_bias() {
        let calibration = InstrumentCalibration {
            stat_bias: BiasPolynomial::new(vec![vec![1000.0]]),
            lsq_bias: BiasPolynomial::new(vec![vec![0.0, 0.5]]),
            ..Default::default()
        };
        let assembler = ParameterAssembler::new(&calibration, 10e-6);
        let fmod = calibration.modulation_frequency_hz(50.0);
        let sinc = assembler.sinc_correction(1.0 / fmod);

        assert_relative_eq!(
            assembler.mpp_stat(50.0, sinc),
            5e6 * sinc + 1000.0,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            assembler.mpp_lsq(50.0, sinc, fmod),
            5e6 * sinc + 0.5 * fmod,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_assemble_gate_time_too_long() {
        let calibration = InstrumentCalibration::default();
        let assembler = ParameterAssembler::new(&calibration, 50e-6);
        let series = SeriesStatistics::from_samples(&[2500.0, 2500.0]).unwrap();
        let params = assembler.assemble(
            &series,
            &[spectral_tone(50.0)],
            &aggregate(250.0, vec![250.0]),
            vec![],
        );

        assert!(params.is_gate_time_too_long());
        assert!(params.mpp_hz.is_nan());
        assert!(params.mpp_uncertainty_hz.is_nan());
        assert!(params.tones[0].sinc_correction.is_nan());
        // Carrier does not depend on the sinc factor
        assert_relative_eq!(params.carrier_total_hz, 50e6, max_relative = 1e-12);
        assert!(params.modulation_frequency_hz().is_finite());
    }

    #[test]
    fn test_assemble_dual_tone() {
        let calibration = InstrumentCalibration::default();
        let assembler = ParameterAssembler::new(&calibration, 10e-6);
        let series = SeriesStatistics::from_samples(&[500.0, 500.0]).unwrap();
        let params = assembler.assemble(
            &series,
            &[spectral_tone(50.0), spectral_tone(20.0)],
            &aggregate(f64::NAN, vec![30.0, 20.0]),
            vec![],
        );

        assert!(params.is_dual());
        assert_eq!(params.tones.len(), 2);
        assert!(params.mpp_hz.is_nan());
        assert!(params.tones[1].modulation_frequency_hz > params.tones[0].modulation_frequency_hz);
        assert!(params.tones[1].sinc_correction > params.tones[0].sinc_correction);
        assert!(params.tones[1].mpp_lsq_hz > 2e6);
    }

    #[test]
    fn test_warning_json() {
        let json = serde_json::to_string(&Warning::NoSpectralPeak { tone: 2 }).unwrap();
        assert_eq!(json, r#"{"kind":"no_spectral_peak","tone":2}"#);
    }
}
