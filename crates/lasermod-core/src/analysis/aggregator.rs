//! Moving-window aggregation of per-window fits
//!
//! The centered series is cut into consecutive, non-overlapping windows.
//! Every window is fitted independently and each scalar output feeds its
//! own running statistic. A trailing remainder shorter than the window is
//! ignored.

use super::fitter::{
    statistical_estimate, HarmonicFit, HarmonicFitter, StatisticalEstimate, MIN_FIT_SAMPLES,
};
use crate::error::{EstimationError, FitError};
use crate::pipeline::DiagnosticSink;
use crate::stats::{RunningStatistic, Summary};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw modulation period(s) used for every window fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Periods {
    Single(f64),
    Dual(f64, f64),
}

impl Periods {
    /// Number of tones fitted per window
    pub fn tone_count(&self) -> usize {
        match self {
            Periods::Single(_) => 1,
            Periods::Dual(..) => 2,
        }
    }

    /// Period of the first tone
    pub fn first(&self) -> f64 {
        match *self {
            Periods::Single(tau) | Periods::Dual(tau, _) => tau,
        }
    }

    fn fitter(&self) -> HarmonicFitter {
        match *self {
            Periods::Single(tau) => HarmonicFitter::single(tau),
            Periods::Dual(tau1, tau2) => HarmonicFitter::dual(tau1, tau2),
        }
    }
}

/// Outcome of fitting one window, offered to the diagnostic sink
#[derive(Debug, Clone)]
pub struct WindowFit {
    /// Zero-based window index
    pub index: usize,
    /// Window-statistics estimate
    pub statistical: StatisticalEstimate,
    /// Least-squares estimate, or why it is missing
    pub lsq: Result<HarmonicFit, FitError>,
}

/// Summaries of one aggregation pass (all values in counts)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowedAggregate {
    /// Window length used for this pass
    pub window_size: usize,
    /// Number of windows processed
    pub windows: usize,
    /// Windows whose least-squares fit failed
    pub failed_fits: usize,
    pub carrier_stat: Summary,
    pub depth_stat: Summary,
    pub carrier_lsq: Summary,
    /// One entry per tone
    pub depth_lsq: Vec<Summary>,
}

impl WindowedAggregate {
    /// Number of windows that contributed a least-squares result
    pub fn lsq_fits(&self) -> usize {
        self.windows - self.failed_fits
    }
}

/// Drives the fitter across windows and accumulates the results
pub struct WindowedAggregator<'a> {
    centered: &'a [f64],
    offset: f64,
    periods: Periods,
    fitter: HarmonicFitter,
    carrier_stat: RunningStatistic,
    depth_stat: RunningStatistic,
    carrier_lsq: RunningStatistic,
    depth_lsq: Vec<RunningStatistic>,
    failed_fits: usize,
}

impl<'a> WindowedAggregator<'a> {
    /// Create an aggregator over a centered series whose mean is `offset`
    pub fn new(centered: &'a [f64], offset: f64, periods: Periods) -> Self {
        Self {
            centered,
            offset,
            periods,
            fitter: periods.fitter(),
            carrier_stat: RunningStatistic::new(),
            depth_stat: RunningStatistic::new(),
            carrier_lsq: RunningStatistic::new(),
            depth_lsq: vec![RunningStatistic::new(); periods.tone_count()],
            failed_fits: 0,
        }
    }

    /// Periods used by this aggregator
    pub fn periods(&self) -> Periods {
        self.periods
    }

    /// Run one pass with the given window size
    ///
    /// All running statistics are reset first. `cancel` is polled between
    /// windows.
    ///
    /// # Errors
    /// - [`EstimationError::InvalidWindowSize`] unless `0 < window_size < len`
    /// - [`EstimationError::Cancelled`] if `cancel` is raised during the pass
    pub fn fit_with_window_size(
        &mut self,
        window_size: usize,
        cancel: Option<&AtomicBool>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<WindowedAggregate, EstimationError> {
        let series_len = self.centered.len();
        if window_size == 0 || window_size >= series_len {
            return Err(EstimationError::InvalidWindowSize {
                window_size,
                series_len,
            });
        }

        self.reset();

        let mut windows = 0;
        for (index, window) in self.centered.chunks_exact(window_size).enumerate() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::debug!(window = index, "Aggregation cancelled");
                return Err(EstimationError::Cancelled);
            }

            let statistical = statistical_estimate(window, self.offset);
            self.carrier_stat.update(statistical.carrier);
            self.depth_stat.update(statistical.depth);

            let lsq = self.fitter.fit(window, self.offset);
            match &lsq {
                Ok(fit) => {
                    self.carrier_lsq.update(fit.carrier);
                    for (stat, tone) in self.depth_lsq.iter_mut().zip(&fit.tones) {
                        stat.update(tone.depth);
                    }
                }
                Err(e) => {
                    tracing::trace!(window = index, error = %e, "Window fit failed");
                    self.failed_fits += 1;
                }
            }

            sink.window_fit(&WindowFit {
                index,
                statistical,
                lsq,
            });
            windows += 1;
        }

        let aggregate = WindowedAggregate {
            window_size,
            windows,
            failed_fits: self.failed_fits,
            carrier_stat: self.carrier_stat.summary(),
            depth_stat: self.depth_stat.summary(),
            carrier_lsq: self.carrier_lsq.summary(),
            depth_lsq: self.depth_lsq.iter().map(RunningStatistic::summary).collect(),
        };

        tracing::debug!(
            window_size,
            windows,
            failed_fits = self.failed_fits,
            "Windowed fit complete"
        );

        Ok(aggregate)
    }

    fn reset(&mut self) {
        self.carrier_stat.reset();
        self.depth_stat.reset();
        self.carrier_lsq.reset();
        for stat in &mut self.depth_lsq {
            stat.reset();
        }
        self.failed_fits = 0;
    }
}

/// Candidate range for the optimal window search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSearch {
    /// Use the reference window as is
    Fixed,
    /// Scan `M/10 ..= M`
    #[default]
    UpTo,
    /// Scan `M/2 ..= 2M`
    Around,
}

impl WindowSearch {
    /// Inclusive candidate range for reference size `reference`
    pub fn candidates(&self, reference: usize) -> (usize, usize) {
        match self {
            WindowSearch::Fixed => (reference, reference),
            WindowSearch::UpTo => (reference / 10, reference),
            WindowSearch::Around => (reference / 2, reference.saturating_mul(2)),
        }
    }
}

/// Distance of `size / raw_period` from the nearest integer
pub fn fringe_fraction(size: usize, raw_period: f64) -> f64 {
    let fringes = size as f64 / raw_period;
    (fringes - fringes.round()).abs()
}

/// Window size spanning the closest to a whole number of periods
///
/// Candidates are clamped to `[MIN_FIT_SAMPLES, series_len - 1]`. The scan
/// keeps the last candidate reaching the minimum, so among equally good
/// sizes the largest wins. Returns `reference` when the period is not
/// usable or the clamped range is empty.
///
/// # Example
/// ```
/// use lasermod_core::analysis::{optimal_window_size, WindowSearch};
///
/// // 1010 samples hold 25.25 periods of 40; 1000 holds exactly 25
/// let size = optimal_window_size(1010, 40.0, WindowSearch::UpTo, 100_000);
/// assert_eq!(size, 1000);
/// ```
pub fn optimal_window_size(
    reference: usize,
    raw_period: f64,
    search: WindowSearch,
    series_len: usize,
) -> usize {
    if !raw_period.is_finite() || raw_period <= 0.0 {
        return reference;
    }

    let (low, high) = search.candidates(reference);
    let low = low.max(MIN_FIT_SAMPLES);
    let high = high.min(series_len.saturating_sub(1));
    if low > high {
        return reference;
    }

    let mut best_fraction = f64::INFINITY;
    let mut best_size = reference;
    for size in low..=high {
        let fraction = fringe_fraction(size, raw_period);
        if fraction <= best_fraction {
            best_fraction = fraction;
            best_size = size;
        }
    }

    tracing::debug!(
        reference,
        raw_period,
        optimal = best_size,
        fraction = best_fraction,
        "Optimal window size"
    );
    best_size
}
