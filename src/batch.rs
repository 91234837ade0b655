//! File evaluation and batch processing
//!
//! Files are independent: each one is read and estimated on its own, in
//! parallel for a batch. Cross-file statistics are gathered afterwards from
//! the collected results.

use crate::input::{CounterRecording, InputError};
use lasermod_core::pipeline::{DiagnosticSink, NoopSink, Pipeline, PipelineConfig};
use lasermod_core::stats::{RunningStatistic, Summary};
use lasermod_core::{EstimationError, ParameterSet};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Estimation failed for {path}: {source}")]
    Estimation {
        path: PathBuf,
        #[source]
        source: EstimationError,
    },
}

/// Result of evaluating one recording
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub path: PathBuf,
    /// Recording timestamp as Modified Julian Date
    pub timestamp_mjd: Option<f64>,
    pub params: ParameterSet,
}

/// Read and evaluate one recording
pub fn evaluate_file(
    path: &Path,
    config: &PipelineConfig,
    cancel: Option<&AtomicBool>,
    sink: &mut dyn DiagnosticSink,
) -> Result<Evaluation, ProcessError> {
    let recording = CounterRecording::read(path, &config.calibration)?;

    let mut pipeline = Pipeline::new(config);
    if let Some(flag) = cancel {
        pipeline = pipeline.with_cancellation(flag);
    }
    let params = pipeline
        .run(&recording.readings, recording.gate_time_s, sink)
        .map_err(|source| ProcessError::Estimation {
            path: path.to_path_buf(),
            source,
        })?
        .with_name(recording.name.clone());

    for warning in &params.warnings {
        tracing::debug!(file = %recording.name, %warning, "Evaluation warning");
    }
    tracing::info!(
        file = %recording.name,
        mpp_mhz = params.mpp_hz * 1e-6,
        window_size = params.window_size,
        "Evaluated recording"
    );

    Ok(Evaluation {
        path: path.to_path_buf(),
        timestamp_mjd: recording.timestamp_mjd(),
        params,
    })
}

/// Outcome for one file of a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: PathBuf,
    pub result: Result<Evaluation, ProcessError>,
}

/// Evaluate `paths` in parallel, returning outcomes in input order
///
/// Files not yet started when `cancel` is raised are reported as cancelled.
pub fn process_files(
    paths: &[PathBuf],
    config: &PipelineConfig,
    cancel: &AtomicBool,
) -> Vec<BatchOutcome> {
    paths
        .par_iter()
        .map(|path| {
            let result = if cancel.load(Ordering::Relaxed) {
                Err(ProcessError::Estimation {
                    path: path.clone(),
                    source: EstimationError::Cancelled,
                })
            } else {
                evaluate_file(path, config, Some(cancel), &mut NoopSink)
            };
            if let Err(e) = &result {
                tracing::error!(path = %path.display(), error = %e, "Failed to evaluate recording");
            }
            BatchOutcome {
                path: path.clone(),
                result,
            }
        })
        .collect()
}

/// Mpp and statistical carrier across a batch (Hz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchSummary {
    pub mpp: Summary,
    pub carrier: Summary,
}

impl BatchSummary {
    /// Summarize the successful outcomes; undefined values are skipped
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let mut mpp = RunningStatistic::new();
        let mut carrier = RunningStatistic::new();
        for evaluation in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
            mpp.update(evaluation.params.mpp_hz);
            carrier.update(evaluation.params.carrier_stat_hz);
        }
        Self {
            mpp: mpp.summary(),
            carrier: carrier.summary(),
        }
    }
}
