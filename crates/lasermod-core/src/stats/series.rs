//! Whole-series statistics and the mean-centered series
//!
//! Computed once per input series; every later stage works on the centered
//! series and adds the mean back where absolute counter values are needed.

use crate::error::EstimationError;

/// Statistics of a complete counter series
///
/// # Example
/// ```
/// use lasermod_core::stats::SeriesStatistics;
///
/// let stats = SeriesStatistics::from_samples(&[1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(stats.mean(), 2.0);
/// assert_eq!(stats.centered(), &[-1.0, 0.0, 1.0]);
/// ```
#[derive(Debug, Clone)]
pub struct SeriesStatistics {
    /// Arithmetic mean (the carrier, in counts)
    mean: f64,
    /// Population standard deviation
    std_dev: f64,
    /// Smallest reading
    min: f64,
    /// Largest reading
    max: f64,
    /// Series minus its mean, same order and length as the input
    centered: Vec<f64>,
}

impl SeriesStatistics {
    /// Compute the statistics of `samples`
    ///
    /// # Errors
    /// [`EstimationError::EmptyInput`] if `samples` is empty.
    pub fn from_samples(samples: &[f64]) -> Result<Self, EstimationError> {
        if samples.is_empty() {
            return Err(EstimationError::EmptyInput);
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum_sq = 0.0;
        let centered: Vec<f64> = samples
            .iter()
            .map(|&y| {
                min = min.min(y);
                max = max.max(y);
                let d = y - mean;
                sum_sq += d * d;
                d
            })
            .collect();

        Ok(Self {
            mean,
            std_dev: (sum_sq / n).sqrt(),
            min,
            max,
            centered,
        })
    }

    /// Arithmetic mean of the series
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation of the series
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Smallest reading
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest reading
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Number of readings
    pub fn len(&self) -> usize {
        self.centered.len()
    }

    /// Always false; construction rejects empty series
    pub fn is_empty(&self) -> bool {
        self.centered.is_empty()
    }

    /// The mean-centered series
    pub fn centered(&self) -> &[f64] {
        &self.centered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_empty_input_rejected() {
        let result = SeriesStatistics::from_samples(&[]);
        assert_eq!(result.unwrap_err(), EstimationError::EmptyInput);
    }

    #[test]
    fn test_single_sample() {
        let stats = SeriesStatistics::from_samples(&[42.0]).unwrap();
        assert_eq!(stats.mean(), 42.0);
        assert_eq!(stats.std_dev(), 0.0);
        assert_eq!(stats.min(), 42.0);
        assert_eq!(stats.max(), 42.0);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.centered(), &[0.0]);
    }

    #[test]
    fn test_population_std() {
        let stats =
            SeriesStatistics::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_abs_diff_eq!(stats.mean(), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.std_dev(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_noiseless_sinusoid() {
        // A = 3, T = 40 samples, C = 500, N = 50 periods
        let amplitude = 3.0;
        let period = 40.0;
        let offset = 500.0;
        let samples: Vec<f64> = (0..2000)
            .map(|i| offset + amplitude * (2.0 * PI * i as f64 / period).sin())
            .collect();

        let stats = SeriesStatistics::from_samples(&samples).unwrap();
        assert_abs_diff_eq!(stats.mean(), offset, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.max() - stats.min(), 2.0 * amplitude, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.std_dev(), amplitude / 2.0f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_centered_series_has_zero_mean() {
        let samples: Vec<f64> = (0..100).map(|i| (i * i) as f64).collect();
        let stats = SeriesStatistics::from_samples(&samples).unwrap();
        let centered_sum: f64 = stats.centered().iter().sum();
        assert_eq!(stats.centered().len(), samples.len());
        assert_abs_diff_eq!(centered_sum, 0.0, epsilon = 1e-6);
    }
}
