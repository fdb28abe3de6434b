// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams between layers. The application layer talks to these
// traits, never to the concrete CSV reader or metrics file.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::product::ProductRecord;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce catalogue records.
///
/// Implementations:
///   - CsvLoader → reads a CSV file with a header row
pub trait ExampleSource {
    /// Load every record from this source, in source order.
    fn load_all(&self) -> Result<Vec<ProductRecord>>;
}

// ─── MetricSink ───────────────────────────────────────────────────────────────
/// Receives scalar training metrics and the run configuration.
///
/// Implementations:
///   - MetricsLogger → appends to metrics.csv and mirrors to tracing
///   - test sinks that record values in memory
pub trait MetricSink {
    /// Record the resolved configuration once at run start.
    fn log_config(&mut self, config: &serde_json::Value) -> Result<()>;

    /// Record one scalar, e.g. ("val/loss", 1.23) at a given step.
    fn log_scalar(&mut self, step: usize, epoch: usize, name: &str, value: f64) -> Result<()>;
}

impl<T: MetricSink + ?Sized> MetricSink for &mut T {
    fn log_config(&mut self, config: &serde_json::Value) -> Result<()> {
        (**self).log_config(config)
    }

    fn log_scalar(&mut self, step: usize, epoch: usize, name: &str, value: f64) -> Result<()> {
        (**self).log_scalar(step, epoch, name, value)
    }
}
