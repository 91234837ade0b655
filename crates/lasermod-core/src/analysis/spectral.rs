//! FFT-based modulation frequency detection
//!
//! The centered counter series is transformed once; the dominant bin (or the
//! dominant bin of each of two peak regions) gives the raw modulation
//! frequency in bins. Raw periods follow as `N / bin` samples.
//!
//! Only bins `1 .. N/2` (exclusive) are searched: bin 0 is DC and the upper
//! half mirrors the lower half for real input.

use rustfft::{num_complex::Complex, FftPlanner};

/// Magnitude spectrum of a centered series
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Complex FFT output, one value per bin
    bins: Vec<Complex<f64>>,
    /// `|bins[i]|`, same length
    magnitudes: Vec<f64>,
}

impl Spectrum {
    /// Length of the transform (equals the series length)
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Whether the transform is empty
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Complex bin values
    pub fn bins(&self) -> &[Complex<f64>] {
        &self.bins
    }

    /// Bin magnitudes over the full transform length
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    /// Bins that carry non-DC, non-mirrored information
    pub fn useful_bins(&self) -> std::ops::Range<usize> {
        1..(self.len() / 2).max(1)
    }

    /// Largest magnitude over the full transform, DC included
    pub fn global_max(&self) -> f64 {
        self.magnitudes.iter().copied().fold(0.0, f64::max)
    }

    /// Index of the largest magnitude among `indices`
    ///
    /// Later indices in iteration order win ties. Returns 0 when no index
    /// has a positive magnitude.
    pub fn peak_bin<I>(&self, indices: I) -> usize
    where
        I: IntoIterator<Item = usize>,
    {
        let mut best_bin = 0;
        let mut best_magnitude = 0.0;
        for i in indices {
            let magnitude = self.magnitudes[i];
            if magnitude > 0.0 && magnitude >= best_magnitude {
                best_magnitude = magnitude;
                best_bin = i;
            }
        }
        best_bin
    }

    /// First contiguous run of `indices` whose magnitude exceeds `cutoff`
    ///
    /// The scan stops at the first bin at or below the cutoff after the run
    /// has started, so separate peaks are never merged.
    pub fn peak_region<I>(&self, indices: I, cutoff: f64) -> Vec<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut region = Vec::new();
        for i in indices {
            if self.magnitudes[i] > cutoff {
                region.push(i);
            } else if !region.is_empty() {
                break;
            }
        }
        region
    }
}

/// Raw modulation frequency of one tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEstimate {
    /// Dominant bin index; 0 means no usable peak
    pub raw_frequency: usize,
    /// Transform length the bin refers to
    pub series_len: usize,
}

impl ToneEstimate {
    /// Whether a spectral peak was found
    pub fn is_valid(&self) -> bool {
        self.raw_frequency > 0 && self.series_len > 0
    }

    /// Modulation period in samples (NaN without a peak)
    pub fn raw_period(&self) -> f64 {
        if self.is_valid() {
            self.series_len as f64 / self.raw_frequency as f64
        } else {
            f64::NAN
        }
    }
}

/// Result of the two-tone search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualToneEstimate {
    /// Peak of the region found scanning up from bin 1 (lower frequency)
    pub first: ToneEstimate,
    /// Peak of the region found scanning down from the midpoint
    pub second: ToneEstimate,
}

impl DualToneEstimate {
    /// Both regions resolved to the same bin: only one modulation present
    pub fn is_single_modulation(&self) -> bool {
        self.first.is_valid() && self.first.raw_frequency == self.second.raw_frequency
    }
}

/// FFT-based period estimator
///
/// # Example
/// ```
/// use lasermod_core::analysis::spectral::SpectralEstimator;
///
/// let series: Vec<f64> = (0..1024)
///     .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 32.0).sin())
///     .collect();
/// let mut estimator = SpectralEstimator::new(0.1);
/// let spectrum = estimator.transform(&series);
/// let tone = estimator.single_tone(&spectrum);
/// assert_eq!(tone.raw_frequency, 32);
/// assert_eq!(tone.raw_period(), 32.0);
/// ```
pub struct SpectralEstimator {
    /// FFT planner, reused across series of equal length
    planner: FftPlanner<f64>,
    /// Peak-region cutoff as a fraction of the global maximum
    cutoff_factor: f64,
}

impl SpectralEstimator {
    /// Create an estimator with the given peak-region cutoff factor
    pub fn new(cutoff_factor: f64) -> Self {
        Self {
            planner: FftPlanner::new(),
            cutoff_factor,
        }
    }

    /// Configured peak-region cutoff factor
    pub fn cutoff_factor(&self) -> f64 {
        self.cutoff_factor
    }

    /// Forward transform of a centered series
    pub fn transform(&mut self, centered: &[f64]) -> Spectrum {
        let mut bins: Vec<Complex<f64>> =
            centered.iter().map(|&x| Complex::new(x, 0.0)).collect();

        if !bins.is_empty() {
            let fft = self.planner.plan_fft_forward(bins.len());
            fft.process(&mut bins);
        }

        let magnitudes = bins.iter().map(|c| c.norm()).collect();
        tracing::trace!(len = centered.len(), "Spectrum computed");
        Spectrum { bins, magnitudes }
    }

    /// Dominant bin over the useful half of the spectrum
    pub fn single_tone(&self, spectrum: &Spectrum) -> ToneEstimate {
        let raw_frequency = spectrum.peak_bin(spectrum.useful_bins());
        tracing::debug!(raw_frequency, len = spectrum.len(), "Single tone peak");
        ToneEstimate {
            raw_frequency,
            series_len: spectrum.len(),
        }
    }

    /// Dominant bins of the lowest and highest peak regions
    pub fn dual_tone(&self, spectrum: &Spectrum) -> DualToneEstimate {
        let cutoff = self.cutoff_factor * spectrum.global_max();
        let useful = spectrum.useful_bins();

        let low_region = spectrum.peak_region(useful.clone(), cutoff);
        let high_region = spectrum.peak_region(useful.rev(), cutoff);

        let first = ToneEstimate {
            raw_frequency: spectrum.peak_bin(low_region.iter().copied()),
            series_len: spectrum.len(),
        };
        let second = ToneEstimate {
            raw_frequency: spectrum.peak_bin(high_region.iter().copied()),
            series_len: spectrum.len(),
        };

        tracing::debug!(
            first = first.raw_frequency,
            second = second.raw_frequency,
            low_region_len = low_region.len(),
            high_region_len = high_region.len(),
            "Dual tone peaks"
        );

        DualToneEstimate { first, second }
    }
}
