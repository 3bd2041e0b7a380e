// ============================================================
// Layer 6 — Experiment Tracker
// ============================================================
// Records per-step training metrics, one CSV file per run.
//
// Layout:
//   {tracker_dir}/
//     {run_name}/
//       metrics.csv     ← step,metric,value
//
// Example:
//   step,metric,value
//   0,train_loss,9.210340
//   0,perplexity,10000.000000
//   1,train_loss,8.774512
//   ...
//
// Starting a run whose directory already exists deletes it first,
// so re-running an experiment under the same name always begins
// with an empty history.
//
// The training loop never talks to a tracker directly. It goes
// through `TrackerHandle`, which logs backend failures and keeps
// training going without metrics.

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::ExperimentTracker;

pub const METRICS_FILE: &str = "metrics.csv";

/// File-backed experiment tracker.
pub struct CsvTracker {
    root: PathBuf,
    file: Option<File>,
}

impl CsvTracker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), file: None }
    }

    /// Path of a run's metrics file under this tracker's root.
    pub fn metrics_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(METRICS_FILE)
    }

    fn remove_existing(run_dir: &Path, name: &str) -> Result<()> {
        if run_dir.exists() {
            fs::remove_dir_all(run_dir).with_context(|| {
                format!("Cannot remove previous run '{}'", run_dir.display())
            })?;
            tracing::info!("Removed previous experiment '{}'", name);
        } else {
            tracing::info!("No previous experiment named '{}'", name);
        }
        Ok(())
    }
}

impl ExperimentTracker for CsvTracker {
    fn start_run(&mut self, name: &str) -> Result<()> {
        let run_dir = self.root.join(name);
        Self::remove_existing(&run_dir, name)?;

        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Cannot create '{}'", run_dir.display()))?;

        let path = self.metrics_path(name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        writeln!(file, "step,metric,value")?;

        self.file = Some(file);
        tracing::info!("Tracking experiment '{}' in '{}'", name, path.display());
        Ok(())
    }

    fn record(&mut self, metric: &str, value: f64, step: usize) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .context("record() called before start_run()")?;
        writeln!(file, "{step},{metric},{value:.6}")?;
        Ok(())
    }
}

// ─── TrackerHandle ────────────────────────────────────────────────────────────
/// Best-effort front for an experiment tracker.
///
/// A failing `start_run` or `record` is logged as a warning and
/// disables tracking for the rest of the run; nothing is ever
/// returned to the caller.
pub struct TrackerHandle {
    backend: Option<Box<dyn ExperimentTracker>>,
}

impl TrackerHandle {
    /// Start `name` on `backend`, or continue untracked if that fails.
    pub fn start(mut backend: Box<dyn ExperimentTracker>, name: &str) -> Self {
        match backend.start_run(name) {
            Ok(()) => Self { backend: Some(backend) },
            Err(e) => {
                tracing::warn!("Experiment tracking disabled: {e:#}");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn record(&mut self, metric: &str, value: f64, step: usize) {
        let failure = match self.backend.as_mut() {
            Some(backend) => backend.record(metric, value, step).err(),
            None => None,
        };

        if let Some(e) = failure {
            tracing::warn!("Experiment tracking disabled after write failure: {e:#}");
            self.backend = None;
        }
    }
}
