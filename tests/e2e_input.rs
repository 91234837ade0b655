//! E2E tests for reading counter recordings from disk

use lasermod::input::{self, CounterRecording, InputError};
use lasermod::InstrumentCalibration;
use std::fs;
use std::path::PathBuf;

fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_read_recording_applies_totalize_correction() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "T010S01_20240315_143000.csv", "500\n501\n\n499\n");
    let calibration = InstrumentCalibration {
        totalize_correction: 0.25,
        ..Default::default()
    };

    let recording = CounterRecording::read(&path, &calibration).unwrap();
    assert_eq!(recording.name, "T010S01_20240315_143000");
    assert!((recording.gate_time_s - 10e-6).abs() < 1e-15);
    assert_eq!(recording.readings, vec![500.25, 501.25, 499.25]);

    let mjd = recording.timestamp_mjd().expect("Timestamp postfix should be parsed");
    assert!((mjd - 60384.604166).abs() < 1e-5, "MJD {mjd}");
}

#[test]
fn test_recording_without_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "T020.csv", "1000\n");

    let recording = CounterRecording::read(&path, &InstrumentCalibration::default()).unwrap();
    assert!(recording.timestamp.is_none());
    assert!(recording.timestamp_mjd().is_none());
    assert!((recording.gate_time_s - 20e-6).abs() < 1e-15);
}

#[test]
fn test_missing_gate_time_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "recording.csv", "500\n");

    let err = CounterRecording::read(&path, &InstrumentCalibration::default()).unwrap_err();
    assert!(matches!(err, InputError::NoGateTime(ref name) if name == "recording"));
}

#[test]
fn test_file_without_readings_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "T010.csv", "frequency\n\n");

    let err = CounterRecording::read(&path, &InstrumentCalibration::default()).unwrap_err();
    assert!(matches!(err, InputError::NoReadings(_)));
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("T010.csv");

    let err = CounterRecording::read(&path, &InstrumentCalibration::default()).unwrap_err();
    assert!(matches!(err, InputError::Io { .. }));
    assert!(err.to_string().contains("T010.csv"));
}

#[test]
fn test_scan_directory_lists_recordings_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir, "T020.csv", "1\n");
    write(&dir, "T010.CSV", "1\n");
    write(&dir, "notes.txt", "ignored");
    fs::create_dir(dir.path().join("nested.csv")).unwrap();

    let files = input::scan_directory(dir.path()).unwrap();
    let names: Vec<String> = files.iter().map(|p| input::file_stem(p)).collect();
    assert_eq!(names, vec!["T010", "T020"]);
}

#[test]
fn test_scan_directory_rejects_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "T010.csv", "1\n");

    let err = input::scan_directory(&path).unwrap_err();
    assert!(matches!(err, InputError::NotADirectory(_)));
}
