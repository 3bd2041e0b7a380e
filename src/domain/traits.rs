// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only talks to these traits, so the
// corpus format and the metrics backend can be swapped without
// touching the training loop.

use anyhow::Result;
use crate::domain::caption::CaptionPair;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can list the image/caption pairs of a corpus.
///
/// Implementations:
///   - CorpusLoader → reads a JSON caption index next to the images
pub trait CorpusSource {
    /// Load every pair in the corpus, in index order.
    fn load_pairs(&self) -> Result<Vec<CaptionPair>>;
}

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Write-only sink for scalar training metrics, keyed by run name.
///
/// Implementations:
///   - CsvTracker → one `metrics.csv` per run under a tracker root
///
/// Callers are expected to isolate failures (see `TrackerHandle`):
/// metrics are observational and must never abort a training run.
pub trait ExperimentTracker {
    /// Begin recording under `name`. A run of the same name that
    /// already exists is deleted first, so its history starts empty.
    fn start_run(&mut self, name: &str) -> Result<()>;

    /// Append one scalar sample for `metric` at `step`.
    fn record(&mut self, metric: &str, value: f64, step: usize) -> Result<()>;
}
