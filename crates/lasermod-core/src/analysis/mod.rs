//! Spectral period detection, per-window fitting and aggregation

pub mod aggregator;
pub mod fitter;
pub mod spectral;

pub use aggregator::{
    optimal_window_size, Periods, WindowFit, WindowSearch, WindowedAggregate, WindowedAggregator,
};
pub use fitter::{HarmonicFit, HarmonicFitter, StatisticalEstimate, ToneFit, MIN_FIT_SAMPLES};
pub use spectral::{DualToneEstimate, SpectralEstimator, Spectrum, ToneEstimate};
