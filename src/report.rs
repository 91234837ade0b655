//! Text rendering of evaluation results
//!
//! Frequencies are printed in MHz (carriers, Mpp) or kHz (modulation
//! frequency); undefined values print as `NaN`.

use crate::batch::{BatchSummary, Evaluation};
use clap::ValueEnum;
use lasermod_core::{ParameterSet, ToneParameters};
use std::fmt::Write;

/// Report layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line with the combined Mpp
    #[default]
    Succinct,
    /// Multi-line report with every field
    Verbose,
    /// Comma-separated numeric fields
    Csv,
    /// Measured vs. nominal values parsed from the file name
    TestCase,
    /// Full parameter set as JSON
    Json,
}

const RULE: &str = "===============================================================";

/// Render one evaluation
pub fn render(evaluation: &Evaluation, format: OutputFormat) -> serde_json::Result<String> {
    let params = &evaluation.params;
    Ok(match format {
        OutputFormat::Succinct => succinct(params),
        OutputFormat::Verbose => verbose(evaluation),
        OutputFormat::Csv => csv_row(params),
        OutputFormat::TestCase => test_case(params),
        OutputFormat::Json => serde_json::to_string_pretty(evaluation)?,
    })
}

/// Heading printed once before the rows of a format, if any
pub fn header(format: OutputFormat) -> Option<&'static str> {
    match format {
        OutputFormat::Csv => Some(csv_header()),
        _ => None,
    }
}

/// One-line summary
pub fn succinct(params: &ParameterSet) -> String {
    match params.tones.as_slice() {
        [first, second] => format!(
            "{}  ->  Mpp(1) = {:.3} ± {:.3} MHz   Mpp(2) = {:.3} ± {:.3} MHz",
            params.name,
            first.mpp_lsq_hz * 1e-6,
            first.mpp_lsq_dispersion_hz * 1e-6,
            second.mpp_lsq_hz * 1e-6,
            second.mpp_lsq_dispersion_hz * 1e-6,
        ),
        _ => format!(
            "{} -> Mpp = {:.3} ± {:.3} MHz",
            params.name,
            params.mpp_hz * 1e-6,
            params.mpp_uncertainty_hz * 1e-6,
        ),
    }
}

fn tone_lines(out: &mut String, tone: &ToneParameters, indent: &str) {
    let _ = writeln!(
        out,
        "{indent}Modulation period:         {:.1} µs",
        tone.modulation_period_s * 1e6
    );
    let _ = writeln!(
        out,
        "{indent}Modulation period:         {:.3} (in counter samples)",
        tone.raw_period
    );
    let _ = writeln!(
        out,
        "{indent}Modulation frequency:      {:.3} kHz",
        tone.modulation_frequency_hz * 1e-3
    );
    let _ = writeln!(
        out,
        "{indent}Sinc correction factor:    {:.3}",
        tone.sinc_correction
    );
}

/// Multi-line report
pub fn verbose(evaluation: &Evaluation) -> String {
    let params = &evaluation.params;
    let mut out = String::new();

    let _ = writeln!(out, "Program version:           lasermod {}", crate::VERSION);
    let _ = writeln!(out, "File name:                 {}", params.name);
    if let Some(mjd) = evaluation.timestamp_mjd {
        let _ = writeln!(out, "Timestamp (MJD):           {mjd:.4} d");
    }
    let _ = writeln!(out, "Gate time:                 {:.0} µs", params.gate_time_s * 1e6);
    let _ = writeln!(
        out,
        "Frequency resolution:      {:.3} MHz",
        params.resolution_hz * 1e-6
    );
    let _ = writeln!(
        out,
        "Window size:               {} (in counter samples)",
        params.window_size
    );
    let _ = writeln!(out, "Number of windows:         {}", params.windows);
    let _ = writeln!(out, "Number of counter samples: {}", params.sample_count);
    let _ = writeln!(out, "Minimum raw reading:       {:.0}", params.min_reading);
    let _ = writeln!(out, "Maximum raw reading:       {:.0}", params.max_reading);
    let _ = writeln!(
        out,
        "Carrier frequency (tot):   {:.3} ± {:.3} MHz",
        params.carrier_total_hz * 1e-6,
        params.carrier_total_dispersion_hz * 1e-6
    );
    let _ = writeln!(
        out,
        "Carrier frequency (stat):  {:.3} ± {:.3} MHz",
        params.carrier_stat_hz * 1e-6,
        params.carrier_stat_dispersion_hz * 1e-6
    );
    let _ = writeln!(
        out,
        "Carrier frequency (LSQ):   {:.3} ± {:.3} MHz",
        params.carrier_lsq_hz * 1e-6,
        params.carrier_lsq_dispersion_hz * 1e-6
    );

    if params.is_dual() {
        for (i, tone) in params.tones.iter().enumerate() {
            let _ = writeln!(out, "{RULE}");
            let _ = writeln!(out, "Laser {}", i + 1);
            tone_lines(&mut out, tone, "  ");
            let _ = writeln!(
                out,
                "  Modulation width (LSQ):    {:.3} ± {:.3} MHz",
                tone.mpp_lsq_hz * 1e-6,
                tone.mpp_lsq_dispersion_hz * 1e-6
            );
        }
        let _ = writeln!(out, "{RULE}");
    } else {
        if let Some(tone) = params.primary_tone() {
            tone_lines(&mut out, tone, "");
        }
        let _ = writeln!(
            out,
            "Modulation width (stat):   {:.3} ± {:.3} MHz",
            params.mpp_stat_hz * 1e-6,
            params.mpp_stat_dispersion_hz * 1e-6
        );
        let _ = writeln!(
            out,
            "Modulation width (LSQ):    {:.3} ± {:.3} MHz",
            params.mpp_lsq_hz() * 1e-6,
            params.mpp_lsq_dispersion_hz() * 1e-6
        );
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(
            out,
            "Modulation width:          {:.3} ± {:.3} MHz",
            params.mpp_hz * 1e-6,
            params.mpp_uncertainty_hz * 1e-6
        );
        let _ = writeln!(out, "{RULE}");
    }

    for warning in &params.warnings {
        let _ = writeln!(out, "Warning: {warning}");
    }
    out
}

/// Column names matching [`csv_row`]
pub fn csv_header() -> &'static str {
    "filename,gate time / µs,window size,overall beat / MHz,overall standard deviation / MHz,\
     carrier from LSQ fit / MHz,standard deviation of carrier from LSQ fit / MHz,\
     Mpp from statistics / MHz,Mpp from statistics standard deviation / MHz,\
     Mpp LSQ / MHz,Mpp LSQ standard deviation / MHz,tau / µs,f_mod / kHz,Mpp / MHz,U(Mpp) / MHz"
}

/// One CSV row (first tone for dual-tone results)
pub fn csv_row(params: &ParameterSet) -> String {
    let tau_us = params
        .primary_tone()
        .map_or(f64::NAN, |t| t.modulation_period_s * 1e6);
    format!(
        "{},{:.0},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.1},{:.4},{:.4},{:.4}",
        params.name,
        params.gate_time_s * 1e6,
        params.window_size,
        params.carrier_total_hz * 1e-6,
        params.carrier_total_dispersion_hz * 1e-6,
        params.carrier_lsq_hz * 1e-6,
        params.carrier_lsq_dispersion_hz * 1e-6,
        params.mpp_stat_hz * 1e-6,
        params.mpp_stat_dispersion_hz * 1e-6,
        params.mpp_lsq_hz() * 1e-6,
        params.mpp_lsq_dispersion_hz() * 1e-6,
        tau_us,
        params.modulation_frequency_hz() * 1e-3,
        params.mpp_hz * 1e-6,
        params.mpp_uncertainty_hz * 1e-6,
    )
}

/// Nominal values encoded in a test file name: `T<gate µs>_<fmod Hz>_<Mpp MHz>`
pub fn nominal_from_name(name: &str) -> Option<(i64, i64, i64)> {
    let mut tokens = name
        .split(['T', '_', '.'])
        .filter(|token| !token.is_empty());
    let gate = tokens.next()?.parse().ok()?;
    let fmod = tokens.next()?.parse().ok()?;
    let mpp = tokens.next()?.parse().ok()?;
    Some((gate, fmod, mpp))
}

/// Measured vs. nominal values of a synthetic test recording
pub fn test_case(params: &ParameterSet) -> String {
    if params.is_dual() {
        return "Test case not implemented for dual modulation".to_string();
    }
    let Some((gate, fmod, mpp)) = nominal_from_name(&params.name) else {
        return format!("Invalid filename syntax {}", params.name);
    };

    let measured_fmod = params.modulation_frequency_hz();
    let mpp_stat = params.mpp_stat_hz * 1e-6;
    let mpp_lsq = params.mpp_lsq_hz() * 1e-6;
    format!(
        "{}, {:2}, {:4}, {}, {:.1}, {:.4}, {:.4}, {:.1}, {:.4}, {:.4}",
        params.name,
        gate,
        fmod,
        mpp,
        measured_fmod,
        mpp_stat,
        mpp_lsq,
        measured_fmod - fmod as f64,
        mpp_stat - mpp as f64,
        mpp_lsq - mpp as f64,
    )
}

/// Two-line summary across a batch
pub fn batch_summary(summary: &BatchSummary) -> String {
    format!(
        "{:4} files -> Mpp = {:.3} ± {:.3} MHz\n           ->  fc = {:.3} ± {:.3} MHz",
        summary.mpp.count,
        summary.mpp.mean * 1e-6,
        summary.mpp.std_dev * 1e-6,
        summary.carrier.mean * 1e-6,
        summary.carrier.std_dev * 1e-6,
    )
}
