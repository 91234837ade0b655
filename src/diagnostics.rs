//! Optional diagnostic output

use lasermod_core::DiagnosticSink;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Keeps the magnitude spectrum for a later CSV dump
#[derive(Debug, Clone, Default)]
pub struct SpectrumRecorder {
    magnitudes: Vec<f64>,
}

impl SpectrumRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded magnitudes (empty if no transform ran)
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    /// Write `index,magnitude` rows for bins `1..N/2`
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(std::fs::File::create(path)?);
        writeln!(out, "index,magnitude")?;
        let half = self.magnitudes.len() / 2;
        for (index, magnitude) in self.magnitudes.iter().enumerate().take(half).skip(1) {
            writeln!(out, "{index},{magnitude}")?;
        }
        out.flush()?;
        tracing::info!(path = %path.display(), bins = half.saturating_sub(1), "Spectrum written");
        Ok(())
    }
}

impl DiagnosticSink for SpectrumRecorder {
    fn spectrum(&mut self, magnitudes: &[f64]) {
        self.magnitudes = magnitudes.to_vec();
    }
}
