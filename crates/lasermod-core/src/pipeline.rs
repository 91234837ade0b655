//! End-to-end estimation of one counter series
//!
//! Each stage consumes the previous stage's output explicitly:
//! series statistics, spectral period detection, window selection,
//! windowed aggregation and parameter assembly. No state survives between
//! series.

use crate::analysis::{
    fitter, optimal_window_size, Periods, SpectralEstimator, WindowFit, WindowSearch,
    WindowedAggregator, MIN_FIT_SAMPLES,
};
use crate::calibration::InstrumentCalibration;
use crate::error::EstimationError;
use crate::params::{ParameterAssembler, ParameterSet, PeriodSource, RawTone, Warning};
use crate::stats::SeriesStatistics;
use crate::DEFAULT_WINDOW_SIZE;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of modulation tones to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulationMode {
    #[default]
    Single,
    Dual,
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

/// Run parameters for [`estimate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reference window size in samples
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Candidate range for the optimal window search
    #[serde(default)]
    pub window_search: WindowSearch,
    #[serde(default)]
    pub modulation: ModulationMode,
    /// Raw period of the first tone, bypassing spectral detection
    #[serde(default)]
    pub raw_period: Option<f64>,
    /// Raw period of the second tone (dual mode only)
    #[serde(default)]
    pub raw_period_2: Option<f64>,
    /// Reference window as a multiple of the first tone's raw period
    #[serde(default)]
    pub periods_per_window: Option<f64>,
    #[serde(default)]
    pub calibration: InstrumentCalibration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window_search: WindowSearch::default(),
            modulation: ModulationMode::default(),
            raw_period: None,
            raw_period_2: None,
            periods_per_window: None,
            calibration: InstrumentCalibration::default(),
        }
    }
}

/// Receiver for intermediate results
///
/// All methods default to doing nothing.
pub trait DiagnosticSink {
    /// Magnitude spectrum of the centered series
    fn spectrum(&mut self, _magnitudes: &[f64]) {}

    /// Outcome of each window fit
    fn window_fit(&mut self, _fit: &WindowFit) {}
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {}

/// Estimate the parameters of one counter series
///
/// # Example
/// ```
/// use lasermod_core::pipeline::{estimate, NoopSink, PipelineConfig};
///
/// // 50 MHz carrier, 2 MHz Mpp, 20 samples per modulation period, 10 µs gate
/// let gate = 10e-6;
/// let samples: Vec<f64> = (0..20_000)
///     .map(|i| gate * (50e6 + 1e6 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin()))
///     .collect();
///
/// let params = estimate(&samples, gate, &PipelineConfig::default(), &mut NoopSink).unwrap();
/// assert!((params.carrier_total_hz - 50e6).abs() < 1.0);
/// assert!((params.tones[0].raw_period - 20.0).abs() < 1e-9);
/// ```
pub fn estimate(
    samples: &[f64],
    gate_time_s: f64,
    config: &PipelineConfig,
    sink: &mut dyn DiagnosticSink,
) -> Result<ParameterSet, EstimationError> {
    Pipeline::new(config).run(samples, gate_time_s, sink)
}

/// Configured estimation pipeline with optional cancellation
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    cancel: Option<&'a AtomicBool>,
}

/// Period detection output
struct DetectedPeriods {
    tones: Vec<RawTone>,
    warnings: Vec<Warning>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Stop between windows once `flag` is set
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run every stage on `samples`
    ///
    /// # Errors
    /// - [`EstimationError::EmptyInput`] for an empty series
    /// - [`EstimationError::InvalidGateTime`] for a non-finite or non-positive gate time
    /// - [`EstimationError::InvalidWindowSize`] if the series is too short to window
    /// - [`EstimationError::Cancelled`] if the cancellation flag was raised
    pub fn run(
        &self,
        samples: &[f64],
        gate_time_s: f64,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<ParameterSet, EstimationError> {
        if samples.is_empty() {
            return Err(EstimationError::EmptyInput);
        }
        if !gate_time_s.is_finite() || gate_time_s <= 0.0 {
            return Err(EstimationError::InvalidGateTime(gate_time_s));
        }
        if self.is_cancelled() {
            return Err(EstimationError::Cancelled);
        }

        let series = SeriesStatistics::from_samples(samples)?;
        tracing::debug!(
            samples = series.len(),
            mean = series.mean(),
            std_dev = series.std_dev(),
            "Series statistics"
        );

        let DetectedPeriods { tones, mut warnings } = self.detect_periods(&series, sink);
        let periods = match tones.as_slice() {
            [first, second] => Periods::Dual(first.raw_period, second.raw_period),
            [first, ..] => Periods::Single(first.raw_period),
            [] => Periods::Single(f64::NAN),
        };

        let reference = self.reference_window(periods.first(), series.len())?;
        let window_size = optimal_window_size(
            reference,
            periods.first(),
            self.config.window_search,
            series.len(),
        );

        let mut aggregator = WindowedAggregator::new(series.centered(), series.mean(), periods);
        let aggregate = aggregator.fit_with_window_size(window_size, self.cancel, sink)?;
        if aggregate.lsq_fits() == 0 {
            tracing::warn!(
                window_size,
                windows = aggregate.windows,
                "No window could be fitted"
            );
            warnings.push(Warning::NoUsableWindows);
        }

        let assembler = ParameterAssembler::new(&self.config.calibration, gate_time_s);
        Ok(assembler.assemble(&series, &tones, &aggregate, warnings))
    }

    /// Raw period(s): supplied, spectral, then zero crossings
    fn detect_periods(
        &self,
        series: &SeriesStatistics,
        sink: &mut dyn DiagnosticSink,
    ) -> DetectedPeriods {
        let supplied = |period: Option<f64>| {
            period.map(|raw_period| RawTone {
                raw_period,
                source: PeriodSource::Supplied,
            })
        };
        let mut warnings = Vec::new();

        let supplied_tones: Vec<RawTone> = match self.config.modulation {
            ModulationMode::Single => supplied(self.config.raw_period).into_iter().collect(),
            ModulationMode::Dual => supplied(self.config.raw_period)
                .zip(supplied(self.config.raw_period_2))
                .map(|(a, b)| vec![a, b])
                .unwrap_or_default(),
        };
        if !supplied_tones.is_empty() {
            tracing::debug!(tones = supplied_tones.len(), "Using supplied raw periods");
            return DetectedPeriods {
                tones: supplied_tones,
                warnings,
            };
        }

        let mut estimator = SpectralEstimator::new(self.config.calibration.peak_region_cutoff_factor);
        let spectrum = estimator.transform(series.centered());
        sink.spectrum(spectrum.magnitudes());

        let spectral = |estimate: crate::analysis::ToneEstimate| RawTone {
            raw_period: estimate.raw_period(),
            source: PeriodSource::Spectral {
                raw_frequency: estimate.raw_frequency,
            },
        };

        let first = match self.config.modulation {
            ModulationMode::Single => estimator.single_tone(&spectrum),
            ModulationMode::Dual => {
                let dual = estimator.dual_tone(&spectrum);
                if dual.is_single_modulation() {
                    tracing::warn!(
                        raw_frequency = dual.first.raw_frequency,
                        "Single modulation detected, continuing with one tone"
                    );
                    warnings.push(Warning::SingleModulationDetected);
                } else if dual.first.is_valid() && dual.second.is_valid() {
                    return DetectedPeriods {
                        tones: vec![spectral(dual.first), spectral(dual.second)],
                        warnings,
                    };
                } else if dual.first.is_valid() {
                    tracing::warn!(tone = 2, "No spectral peak, continuing with one tone");
                    warnings.push(Warning::NoSpectralPeak { tone: 2 });
                }
                dual.first
            }
        };

        if first.is_valid() {
            return DetectedPeriods {
                tones: vec![spectral(first)],
                warnings,
            };
        }

        tracing::warn!(tone = 1, "No spectral peak");
        warnings.push(Warning::NoSpectralPeak { tone: 1 });

        let tone = match fitter::zero_crossing_period(series.centered()) {
            Some(raw_period) => {
                tracing::warn!(raw_period, "Modulation period estimated from zero crossings");
                warnings.push(Warning::PeriodFromZeroCrossings);
                RawTone {
                    raw_period,
                    source: PeriodSource::ZeroCrossings,
                }
            }
            None => RawTone {
                raw_period: f64::NAN,
                source: PeriodSource::Undefined,
            },
        };
        DetectedPeriods {
            tones: vec![tone],
            warnings,
        }
    }

    /// Reference window clamped to `[MIN_FIT_SAMPLES, series_len - 1]`
    fn reference_window(&self, raw_period: f64, series_len: usize) -> Result<usize, EstimationError> {
        let upper = series_len.saturating_sub(1);
        if upper < MIN_FIT_SAMPLES {
            return Err(EstimationError::InvalidWindowSize {
                window_size: self.config.window_size,
                series_len,
            });
        }

        let requested = match self.config.periods_per_window {
            Some(periods) if raw_period.is_finite() && periods > 0.0 => {
                (periods * raw_period).round() as usize
            }
            _ => self.config.window_size,
        };
        let reference = requested.clamp(MIN_FIT_SAMPLES, upper);
        if reference != requested {
            tracing::debug!(requested, reference, series_len, "Reference window clamped");
        }
        Ok(reference)
    }
}
