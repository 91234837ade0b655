//! E2E tests for directory batch processing
//!
//! Recordings are written to a temporary directory in the counter's text
//! format, then scanned and evaluated the way the command line tool does.

use lasermod::batch::{self, BatchSummary, ProcessError};
use lasermod::input::{self, InputError};
use lasermod::pipeline::NoopSink;
use lasermod::report;
use lasermod::{EstimationError, PipelineConfig};
use std::f64::consts::PI;
use std::fmt::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// 20 kHz / 5 MHz Mpp on a 50 MHz carrier at 10 µs gate time
fn write_recording(dir: &Path, name: &str, carrier_hz: f64) {
    let gate = 10e-6;
    let fmod = 20e3;
    let x = gate * fmod;
    let amplitude = 0.5 * 5e6 * (PI * x).sin() / (PI * x);
    let raw_period = 40848.0222 / fmod;

    let mut text = String::new();
    for n in 0..20_000 {
        let hz = carrier_hz + amplitude * (2.0 * PI * n as f64 / raw_period).sin();
        let _ = writeln!(text, "{:.6}", gate * hz);
    }
    std::fs::write(dir.join(name), text).unwrap();
}

#[test]
fn test_batch_over_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_recording(dir.path(), "T010_b.csv", 50e6);
    write_recording(dir.path(), "T010_a.csv", 50.1e6);
    std::fs::write(dir.path().join("T010_c.csv"), "frequency\n").unwrap();
    std::fs::write(dir.path().join("readme.txt"), "not a recording").unwrap();

    let files = input::scan_directory(dir.path()).unwrap();
    assert_eq!(files.len(), 3, "Only .csv files should be scanned");

    let cancel = AtomicBool::new(false);
    let outcomes = batch::process_files(&files, &PipelineConfig::default(), &cancel);

    let names: Vec<String> = outcomes.iter().map(|o| input::file_stem(&o.path)).collect();
    assert_eq!(names, vec!["T010_a", "T010_b", "T010_c"], "Outcomes keep input order");

    let first = outcomes[0].result.as_ref().unwrap();
    assert_eq!(first.params.name, "T010_a");
    assert!((first.params.mpp_hz - 5e6).abs() < 0.1 * 5e6, "Mpp {}", first.params.mpp_hz);
    assert!(outcomes[1].result.is_ok());
    assert!(matches!(
        outcomes[2].result,
        Err(ProcessError::Input(InputError::NoReadings(_)))
    ));

    let summary = BatchSummary::from_outcomes(&outcomes);
    assert_eq!(summary.mpp.count, 2, "Failed files are left out of the summary");
    assert!((summary.carrier.mean - 50.05e6).abs() < 0.001 * 50e6);
    assert!(report::batch_summary(&summary).starts_with("   2 files -> Mpp = "));
}

#[test]
fn test_evaluate_single_file() {
    let dir = tempfile::tempdir().unwrap();
    write_recording(dir.path(), "T010S01_20240315_143000.csv", 50e6);
    let path = dir.path().join("T010S01_20240315_143000.csv");

    let evaluation = batch::evaluate_file(&path, &PipelineConfig::default(), None, &mut NoopSink)
        .unwrap();
    assert_eq!(evaluation.params.sample_count, 20_000);
    assert!(evaluation.timestamp_mjd.is_some());
    assert!((evaluation.params.modulation_frequency_hz() - 20e3).abs() < 0.05 * 20e3);
}

#[test]
fn test_cancelled_batch_skips_files() {
    let dir = tempfile::tempdir().unwrap();
    write_recording(dir.path(), "T010_a.csv", 50e6);
    write_recording(dir.path(), "T010_b.csv", 50e6);
    let files = input::scan_directory(dir.path()).unwrap();

    let cancel = AtomicBool::new(true);
    let outcomes = batch::process_files(&files, &PipelineConfig::default(), &cancel);

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(matches!(
            outcome.result,
            Err(ProcessError::Estimation {
                source: EstimationError::Cancelled,
                ..
            })
        ));
    }
    let summary = BatchSummary::from_outcomes(&outcomes);
    assert_eq!(summary.mpp.count, 0);
    assert!(summary.mpp.mean.is_nan());
}
