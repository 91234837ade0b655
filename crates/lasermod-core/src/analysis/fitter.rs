//! Per-window amplitude and carrier estimation
//!
//! Two independent estimators run on every window:
//! - a statistical estimate from the window's mean and standard deviation
//! - a harmonic least-squares fit with one or two known periods
//!
//! Windows hold values already centered by the global series mean; the
//! caller passes that mean as `offset` so carriers come back in counts.

use crate::error::FitError;
use crate::stats::SeriesStatistics;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// Minimum window length for any per-window estimate
pub const MIN_FIT_SAMPLES: usize = 10;

/// Ratio below which the normal matrix is treated as singular
const MIN_PIVOT_RATIO: f64 = 1e-14;

/// Estimate from window statistics alone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticalEstimate {
    /// Window mean plus offset (counts)
    pub carrier: f64,
    /// Peak-to-peak depth, `std · 2√2` (counts)
    pub depth: f64,
}

impl StatisticalEstimate {
    /// Estimate with every field undefined
    pub fn undefined() -> Self {
        Self {
            carrier: f64::NAN,
            depth: f64::NAN,
        }
    }
}

/// Amplitude and phase of one fitted sinusoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneFit {
    /// Peak-to-peak depth `2√(s² + c²)` (counts)
    pub depth: f64,
    /// `atan2(c, s)` in radians, relative to the first window sample
    pub phase: f64,
}

/// Result of a harmonic least-squares fit
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicFit {
    /// Constant term plus offset (counts)
    pub carrier: f64,
    /// One entry per fitted period, in the order supplied
    pub tones: Vec<ToneFit>,
}

/// Statistical amplitude estimate of one window
///
/// A densely sampled sinusoid of peak-to-peak depth `D` has an arcsine
/// distributed value with standard deviation `D / (2√2)`.
pub fn statistical_estimate(window: &[f64], offset: f64) -> StatisticalEstimate {
    if window.len() < MIN_FIT_SAMPLES {
        return StatisticalEstimate::undefined();
    }
    match SeriesStatistics::from_samples(window) {
        Ok(stats) => StatisticalEstimate {
            carrier: stats.mean() + offset,
            depth: stats.std_dev() * 2.0 * 2.0f64.sqrt(),
        },
        Err(_) => StatisticalEstimate::undefined(),
    }
}

/// Least-squares fitter for sinusoids of known raw periods
///
/// Fits `p0 + Σ (s_k sin(2πx/τ_k) + c_k cos(2πx/τ_k))` for `x = 0..len`
/// by solving the normal equations.
///
/// # Example
/// ```
/// use lasermod_core::analysis::fitter::HarmonicFitter;
///
/// let window: Vec<f64> = (0..500)
///     .map(|x| 2.0 * (2.0 * std::f64::consts::PI * x as f64 / 25.0).sin())
///     .collect();
/// let fit = HarmonicFitter::single(25.0).fit(&window, 100.0).unwrap();
/// assert!((fit.carrier - 100.0).abs() < 1e-9);
/// assert!((fit.tones[0].depth - 4.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct HarmonicFitter {
    /// Raw periods in samples
    periods: Vec<f64>,
}

impl HarmonicFitter {
    /// Fitter for a single tone
    pub fn single(raw_period: f64) -> Self {
        Self {
            periods: vec![raw_period],
        }
    }

    /// Fitter for two superposed tones
    pub fn dual(raw_period_1: f64, raw_period_2: f64) -> Self {
        Self {
            periods: vec![raw_period_1, raw_period_2],
        }
    }

    /// Raw periods this fitter uses
    pub fn periods(&self) -> &[f64] {
        &self.periods
    }

    /// Number of parameters (constant plus a sine/cosine pair per tone)
    fn parameter_count(&self) -> usize {
        1 + 2 * self.periods.len()
    }

    /// Fit one window
    ///
    /// # Errors
    /// - [`FitError::TooFewSamples`] for windows shorter than [`MIN_FIT_SAMPLES`]
    /// - [`FitError::InvalidPeriod`] for a non-finite or non-positive period
    /// - [`FitError::Singular`] when the basis columns are linearly dependent
    pub fn fit(&self, window: &[f64], offset: f64) -> Result<HarmonicFit, FitError> {
        if window.len() < MIN_FIT_SAMPLES {
            return Err(FitError::TooFewSamples {
                len: window.len(),
                min: MIN_FIT_SAMPLES,
            });
        }
        if let Some(&bad) = self.periods.iter().find(|p| !p.is_finite() || **p <= 0.0) {
            return Err(FitError::InvalidPeriod(bad));
        }

        let p = self.solve(window)?;

        let tones = p.as_slice()[1..]
            .chunks_exact(2)
            .map(|sc| ToneFit {
                depth: 2.0 * sc[0].hypot(sc[1]),
                phase: sc[1].atan2(sc[0]),
            })
            .collect();

        Ok(HarmonicFit {
            carrier: p[0] + offset,
            tones,
        })
    }

    /// Accumulate and solve `AᵀA p = Aᵀy`
    fn solve(&self, window: &[f64]) -> Result<DVector<f64>, FitError> {
        let m = self.parameter_count();
        let omegas: Vec<f64> = self.periods.iter().map(|tau| 2.0 * PI / tau).collect();

        let mut ata = DMatrix::<f64>::zeros(m, m);
        let mut aty = DVector::<f64>::zeros(m);
        let mut row = vec![0.0f64; m];

        for (x, &y) in window.iter().enumerate() {
            let x = x as f64;
            row[0] = 1.0;
            for (k, omega) in omegas.iter().enumerate() {
                let (s, c) = (omega * x).sin_cos();
                row[1 + 2 * k] = s;
                row[2 + 2 * k] = c;
            }
            for a in 0..m {
                aty[a] += row[a] * y;
                for b in a..m {
                    ata[(a, b)] += row[a] * row[b];
                }
            }
        }
        for a in 0..m {
            for b in 0..a {
                ata[(a, b)] = ata[(b, a)];
            }
        }

        let cholesky = ata.cholesky().ok_or(FitError::Singular)?;

        let diagonal = cholesky.l_dirty().diagonal();
        let largest = diagonal.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
        let smallest = diagonal.iter().fold(f64::INFINITY, |acc, d| acc.min(d.abs()));
        if smallest.is_nan() || smallest * smallest < MIN_PIVOT_RATIO * largest * largest {
            return Err(FitError::Singular);
        }

        let p = cholesky.solve(&aty);
        if p.iter().all(|v| v.is_finite()) {
            Ok(p)
        } else {
            Err(FitError::Singular)
        }
    }
}

/// Period estimate from zero crossings of a centered series
///
/// Averages the mean spacing of downward crossings and of upward crossings.
/// Returns `None` unless each polarity has at least two crossings.
pub fn zero_crossing_period(centered: &[f64]) -> Option<f64> {
    let mut falling: Vec<usize> = Vec::new();
    let mut rising: Vec<usize> = Vec::new();

    for (i, pair) in centered.windows(2).enumerate() {
        if pair[0] > 0.0 && pair[1] < 0.0 {
            falling.push(i);
        }
        if pair[0] < 0.0 && pair[1] > 0.0 {
            rising.push(i);
        }
    }

    let mean_spacing = |crossings: &[usize]| match crossings {
        [first, .., last] => Some((last - first) as f64 / (crossings.len() - 1) as f64),
        _ => None,
    };

    let falling_period = mean_spacing(&falling)?;
    let rising_period = mean_spacing(&rising)?;
    Some(0.5 * (falling_period + rising_period))
}
