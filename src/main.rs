//! LaserMod - Frequency-counter evaluation of modulated lasers
//!
//! Entry point for the command line tool. Evaluates a single recording or
//! every recording in a directory.

use anyhow::{Context, Result};
use clap::Parser;
use lasermod::batch::{self, BatchSummary};
use lasermod::cli::Cli;
use lasermod::diagnostics::SpectrumRecorder;
use lasermod::input;
use lasermod::report::{self, OutputFormat};
use lasermod::{InstrumentCalibration, PipelineConfig};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(cli.log_directive().parse()?),
        )
        .init();

    info!(version = lasermod::VERSION, build_date = lasermod::BUILD_DATE, "LaserMod starting");

    let calibration = match &cli.calibration {
        Some(path) => InstrumentCalibration::load(path)
            .with_context(|| format!("Failed to load calibration {}", path.display()))?,
        None => InstrumentCalibration::default(),
    };
    let config = cli.pipeline_config(calibration);

    // Set up Ctrl+C handler
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Failed to install Ctrl+C handler");
    }

    let input_path = cli.input_path();
    let format = cli.output_format();
    let report = if input_path.is_dir() {
        if cli.spectrum.is_some() {
            warn!("Spectrum dump ignored in batch mode");
        }
        run_batch(&input_path, &config, format, &cancel)?
    } else {
        run_single(&input_path, &config, format, cli.spectrum.as_deref(), &cancel)?
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => print!("{report}"),
    }
    Ok(())
}

fn run_single(
    path: &Path,
    config: &PipelineConfig,
    format: OutputFormat,
    spectrum: Option<&Path>,
    cancel: &AtomicBool,
) -> Result<String> {
    let path = input::with_default_extension(path);
    let mut recorder = SpectrumRecorder::new();
    let evaluation = batch::evaluate_file(&path, config, Some(cancel), &mut recorder)?;

    if let Some(spectrum_path) = spectrum {
        recorder
            .write_csv(spectrum_path)
            .with_context(|| format!("Failed to write spectrum {}", spectrum_path.display()))?;
    }

    let mut out = String::new();
    if let Some(header) = report::header(format) {
        out.push_str(header);
        out.push('\n');
    }
    out.push_str(&report::render(&evaluation, format)?);
    out.push('\n');
    Ok(out)
}

fn run_batch(
    dir: &Path,
    config: &PipelineConfig,
    format: OutputFormat,
    cancel: &AtomicBool,
) -> Result<String> {
    let files = input::scan_directory(dir)?;
    info!(dir = %dir.display(), files = files.len(), "Processing directory");

    let outcomes = batch::process_files(&files, config, cancel);

    let mut out = String::new();
    if let Some(header) = report::header(format) {
        out.push_str(header);
        out.push('\n');
    }
    for outcome in &outcomes {
        match &outcome.result {
            Ok(evaluation) => out.push_str(&report::render(evaluation, format)?),
            Err(e) => out.push_str(&format!("{}: {e}", outcome.path.display())),
        }
        out.push('\n');
    }

    let summary = BatchSummary::from_outcomes(&outcomes);
    out.push('\n');
    out.push_str(&report::batch_summary(&summary));
    out.push('\n');

    if cancel.load(Ordering::Relaxed) {
        warn!("Batch cancelled, summary covers completed files only");
    }
    Ok(out)
}
