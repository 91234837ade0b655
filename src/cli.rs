//! Command line interface

use crate::report::OutputFormat;
use clap::{Parser, ValueEnum};
use lasermod_core::pipeline::{ModulationMode, PipelineConfig};
use lasermod_core::{InstrumentCalibration, WindowSearch, DEFAULT_WINDOW_SIZE};
use std::path::PathBuf;

/// Window search mode as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchArg {
    /// Keep the reference window
    Fixed,
    /// Scan from a tenth of the reference window up to it
    UpTo,
    /// Scan from half to twice the reference window
    Around,
}

impl From<SearchArg> for WindowSearch {
    fn from(arg: SearchArg) -> Self {
        match arg {
            SearchArg::Fixed => WindowSearch::Fixed,
            SearchArg::UpTo => WindowSearch::UpTo,
            SearchArg::Around => WindowSearch::Around,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lasermod")]
#[command(about = "Carrier frequency and modulation depth from frequency-counter recordings")]
#[command(version)]
pub struct Cli {
    /// Counter recording (extension defaults to .csv) or directory of
    /// recordings; the current directory if omitted
    pub input: Option<PathBuf>,

    /// Write the report to FILE instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Succinct)]
    pub format: OutputFormat,

    /// Verbose report (same as --format verbose)
    #[arg(long, short = 'v', conflicts_with_all = ["format", "test"])]
    pub verbose: bool,

    /// Test case report (same as --format test-case)
    #[arg(long, conflicts_with = "format")]
    pub test: bool,

    /// Reference window size in counter samples
    #[arg(long, short = 'w', default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Reference window as a number of modulation periods
    #[arg(long, short = 'n', value_name = "PERIODS")]
    pub periods: Option<f64>,

    /// Optimal window search mode
    #[arg(long, value_enum, default_value_t = SearchArg::UpTo)]
    pub window_search: SearchArg,

    /// Analyse two superposed modulation tones
    #[arg(long)]
    pub dual: bool,

    /// Raw modulation period in counter samples (skips spectral detection)
    #[arg(long, value_name = "SAMPLES")]
    pub raw_period: Option<f64>,

    /// Raw modulation period of the second tone (with --dual)
    #[arg(long, value_name = "SAMPLES", requires = "dual")]
    pub raw_period_2: Option<f64>,

    /// Instrument calibration JSON file
    #[arg(long, short = 'c', value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Dump the magnitude spectrum of a single recording as CSV
    #[arg(long, value_name = "FILE")]
    pub spectrum: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short = 'q', conflicts_with = "debug")]
    pub quiet: bool,

    /// Log pipeline details
    #[arg(long, short = 'd')]
    pub debug: bool,
}

impl Cli {
    /// Report format after applying the shorthand flags
    pub fn output_format(&self) -> OutputFormat {
        if self.verbose {
            OutputFormat::Verbose
        } else if self.test {
            OutputFormat::TestCase
        } else {
            self.format
        }
    }

    /// Default tracing directive for the chosen verbosity
    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "lasermod=debug"
        } else if self.quiet {
            "lasermod=warn"
        } else {
            "lasermod=info"
        }
    }

    /// Input path, the current directory if none was given
    pub fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Pipeline configuration with the given calibration
    pub fn pipeline_config(&self, calibration: InstrumentCalibration) -> PipelineConfig {
        PipelineConfig {
            window_size: self.window_size,
            window_search: self.window_search.into(),
            modulation: if self.dual {
                ModulationMode::Dual
            } else {
                ModulationMode::Single
            },
            raw_period: self.raw_period,
            raw_period_2: self.raw_period_2,
            periods_per_window: self.periods,
            calibration,
        }
    }
}
