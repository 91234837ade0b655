//! LaserMod - Frequency-counter evaluation of modulated lasers
//!
//! This library re-exports the estimation pipeline from `lasermod-core`
//! and adds the file-level collaborators: counter recording input, report
//! rendering and parallel batch processing.

pub mod batch;
pub mod cli;
pub mod diagnostics;
pub mod input;
pub mod report;

pub use lasermod_core::{analysis, calibration, error, params, pipeline, stats};

pub use lasermod_core::{
    estimate, EstimationError, InstrumentCalibration, ParameterSet, PipelineConfig, Warning,
};
pub use lasermod_core::{BUILD_DATE, DEFAULT_WINDOW_SIZE, VERSION};
