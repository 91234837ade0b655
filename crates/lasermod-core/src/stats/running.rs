//! Online mean / standard deviation accumulator
//!
//! Used by the windowed aggregator to collect one scalar per window and by
//! batch processing to summarize results across files.

use serde::Serialize;

/// Running statistic over a stream of scalar values
///
/// Uses Welford's update so that long streams of nearly identical values
/// (typical for per-window carrier estimates) keep full precision.
/// Non-finite values are counted as rejected and leave the mean and
/// variance untouched.
///
/// # Example
/// ```
/// use lasermod_core::stats::RunningStatistic;
///
/// let mut stat = RunningStatistic::new();
/// stat.update(1.0);
/// stat.update(f64::NAN);
/// stat.update(3.0);
/// assert_eq!(stat.count(), 2);
/// assert_eq!(stat.rejected(), 1);
/// assert_eq!(stat.mean(), 2.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunningStatistic {
    /// Number of accepted values
    count: u64,
    /// Number of non-finite values that were skipped
    rejected: u64,
    /// Current mean of accepted values
    mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
}

/// Snapshot of a [`RunningStatistic`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Number of accepted values
    pub count: u64,
    /// Mean, NaN when no value was accepted
    pub mean: f64,
    /// Sample standard deviation, NaN with fewer than two values
    pub std_dev: f64,
}

impl RunningStatistic {
    /// Create an empty statistic
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value
    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            self.rejected += 1;
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of accepted values
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of rejected (non-finite) values
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Mean of the accepted values (NaN if none)
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Sample variance (NaN with fewer than two values)
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            f64::NAN
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Sample standard deviation (NaN with fewer than two values)
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Current mean, standard deviation and count
    pub fn summary(&self) -> Summary {
        Summary {
            count: self.count,
            mean: self.mean(),
            std_dev: self.std_dev(),
        }
    }

    /// Forget all values
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Extend<f64> for RunningStatistic {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.update(value);
        }
    }
}

impl FromIterator<f64> for RunningStatistic {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stat = Self::new();
        stat.extend(iter);
        stat
    }
}
