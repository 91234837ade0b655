//! LaserMod Core - Carrier and modulation-depth estimation
//!
//! This library estimates, from a series of frequency-counter readings, the
//! carrier (beat) frequency and the peak-to-peak FM depth (Mpp) of one or
//! two frequency-modulated lasers. It combines an FFT period search, a
//! windowed harmonic least-squares fit and a calibration-driven correction
//! of the counter's gate-time attenuation.

pub mod analysis;
pub mod calibration;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod stats;

pub use analysis::{SpectralEstimator, WindowSearch, WindowedAggregator};
pub use calibration::{BiasPolynomial, InstrumentCalibration};
pub use error::{CalibrationError, EstimationError, FitError};
pub use params::{ParameterSet, ToneParameters, Warning};
pub use pipeline::{estimate, DiagnosticSink, ModulationMode, NoopSink, Pipeline, PipelineConfig};
pub use stats::{RunningStatistic, SeriesStatistics};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (YYYY-MM-DD), set by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Default reference window size in counter samples
pub const DEFAULT_WINDOW_SIZE: usize = 1000;
