// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Owns the run directory and everything written into it.
//
// Layout:
//   {model_path}/{run_name}/
//     parameters.json          ← RunConfig, written once, first
//     vocab.json               ← only when the vocabulary was built
//     encoder-1-1000.mpk.gz    ← encoder snapshot, epoch 1, step 1000
//     decoder-1-1000.mpk.gz    ← decoder snapshot, epoch 1, step 1000
//     ...
//
// Snapshots use Burn's CompactRecorder (MessagePack + gzip, half
// precision). Each (component, epoch, step) has its own file and
// every write replaces that whole file, so a snapshot never
// touches another step's file. Nothing is ever pruned here.
//
// Ordering rules enforced at runtime:
//   - the configuration is written before anything else
//   - the vocabulary is written at most once, before any snapshot

use anyhow::{ensure, Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::run_config::RunConfig;
use crate::data::vocabulary::Vocabulary;
use crate::infra::vocab_store::save_vocab;

pub const CONFIG_FILE: &str = "parameters.json";
pub const VOCAB_FILE:  &str = "vocab.json";

/// Extension CompactRecorder appends to snapshot paths.
pub const SNAPSHOT_EXTENSION: &str = "mpk.gz";

pub struct CheckpointManager {
    /// `{model_path}/{run_name}`
    dir: PathBuf,
    config_saved:    bool,
    vocab_saved:     bool,
    snapshots_saved: usize,
}

impl CheckpointManager {
    /// Create the run directory (and parents). Failure is fatal.
    pub fn create(model_path: &Path, run_name: &str) -> Result<Self> {
        let dir = model_path.join(run_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;

        tracing::info!("Run directory: '{}'", dir.display());
        Ok(Self {
            dir,
            config_saved:    false,
            vocab_saved:     false,
            snapshots_saved: 0,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshots_saved(&self) -> usize {
        self.snapshots_saved
    }

    /// Write `parameters.json`. Must be the first write of the run.
    pub fn save_config(&mut self, cfg: &RunConfig) -> Result<()> {
        ensure!(!self.config_saved, "run configuration already written");

        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        self.config_saved = true;
        tracing::info!("Saved run configuration to '{}'", path.display());
        Ok(())
    }

    /// Write `vocab.json` for a freshly built vocabulary.
    pub fn save_vocab(&mut self, vocab: &Vocabulary) -> Result<()> {
        ensure!(self.config_saved, "vocabulary written before the run configuration");
        ensure!(!self.vocab_saved, "vocabulary already written for this run");
        ensure!(self.snapshots_saved == 0, "vocabulary written after a checkpoint");

        save_vocab(vocab, &self.dir.join(VOCAB_FILE))?;
        self.vocab_saved = true;
        Ok(())
    }

    /// `{dir}/{component}-{epoch}-{step}.mpk.gz`
    pub fn snapshot_path(&self, component: &str, epoch: usize, step: usize) -> PathBuf {
        self.dir
            .join(snapshot_stem(component, epoch, step))
            .with_extension(SNAPSHOT_EXTENSION)
    }

    /// Snapshot `module` for (component, epoch, step).
    ///
    /// The module is cloned before recording, so the caller's
    /// parameters are copied out and never shared with the writer.
    pub fn save<B: Backend, M: Module<B>>(
        &mut self,
        component: &str,
        module:    &M,
        epoch:     usize,
        step:      usize,
    ) -> Result<PathBuf> {
        ensure!(self.config_saved, "checkpoint requested before the run configuration was written");

        // The recorder adds the extension itself
        let stem = self.dir.join(snapshot_stem(component, epoch, step));
        module
            .clone()
            .save_file(stem.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", stem.display()))?;

        self.snapshots_saved += 1;
        let path = self.snapshot_path(component, epoch, step);
        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(path)
    }
}

/// Restore `module` from a record written by `CheckpointManager::save`
/// (or any CompactRecorder file). The architecture must match.
/// `path` may name the file with or without its `.mpk.gz` suffix.
pub fn load_module<B: Backend, M: Module<B>>(module: M, path: &Path, device: &B::Device) -> Result<M> {
    let record = CompactRecorder::new()
        .load(record_stem(path), device)
        .with_context(|| format!("Cannot load record '{}'", path.display()))?;

    tracing::info!("Loaded parameters from '{}'", path.display());
    Ok(module.load_record(record))
}

/// The recorder appends its own extension, so hand it the bare stem.
fn record_stem(path: &Path) -> PathBuf {
    let suffix = format!(".{SNAPSHOT_EXTENSION}");
    match path.to_str().and_then(|p| p.strip_suffix(suffix.as_str())) {
        Some(stem) => PathBuf::from(stem),
        None => path.to_path_buf(),
    }
}

fn snapshot_stem(component: &str, epoch: usize, step: usize) -> String {
    format!("{component}-{epoch}-{step}")
}
