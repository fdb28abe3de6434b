// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Production MetricSink. Every scalar becomes one row of
// <base_dir>/metrics.csv and one tracing line:
//
//   step,epoch,name,value
//   3000,1,train/loss,2.418810
//   3000,1,train/lr,0.000005
//   3000,1,val/loss,2.377425
//   3000,1,val/browse_node_acc,0.412000
//   ...
//
// The resolved run configuration is written once to
// <base_dir>/run_config.json at run start.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::MetricSink;

const HEADER: &str = "step,epoch,name,value";

/// Appends scalar metrics to a CSV file.
pub struct MetricsLogger {
    dir:      PathBuf,
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { dir, csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl MetricSink for MetricsLogger {
    fn log_config(&mut self, config: &serde_json::Value) -> Result<()> {
        let path = self.dir.join("run_config.json");
        fs::write(&path, serde_json::to_string_pretty(config)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::info!("Run config written to '{}'", path.display());
        Ok(())
    }

    fn log_scalar(&mut self, step: usize, epoch: usize, name: &str, value: f64) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{step},{epoch},{name},{value:.6}")?;

        tracing::info!("step {:>7} | epoch {} | {:<20} {:.6}", step, epoch, name, value);
        Ok(())
    }
}
