// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Validate the run configuration   (Layer 2)
//   Step 2: Load the caption corpus          (Layer 4 - data)
//   Step 3: Load or build the vocabulary     (Layer 6 - infra)
//   Step 4: Create run dir, save config      (Layer 6 - infra)
//   Step 5: Save the vocabulary if built     (Layer 6 - infra)
//   Step 6: Start experiment tracking        (Layer 6 - infra)
//   Step 7: Build the dataset                (Layer 4 - data)
//   Step 8: Pick the device, run the loop    (Layer 5 - ml)
//
// Configuration errors (bad arguments, unreadable vocabulary,
// missing corpus) surface before anything is written to disk.

use anyhow::Result;
use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    module::Module,
    tensor::backend::AutodiffBackend,
};
use std::path::PathBuf;

use crate::application::run_config::RunConfig;
use crate::data::{
    dataset::CaptionDataset,
    loader::CorpusLoader,
    transform::ImageTransform,
    vocabulary::Vocabulary,
};
use crate::domain::{
    caption::CaptionPair,
    traits::{CorpusSource, ExperimentTracker},
};
use crate::infra::{
    checkpoint::{load_module, CheckpointManager},
    tracker::{CsvTracker, TrackerHandle},
    vocab_store::{build_vocab, load_vocab},
};
use crate::ml::{
    device::{ComputeContext, DeviceSelection},
    model::{CaptionModel, CaptionModelConfig},
    trainer::{BatchLoader, TrainingLoop},
};

/// Where this run's vocabulary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabSource {
    /// Read from `--vocab-path`; never written back
    Loaded,
    /// Built from the corpus; saved into the run directory
    Built,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:  RunConfig,
    tracker: Box<dyn ExperimentTracker>,
}

impl TrainUseCase {
    /// Track metrics with the CSV tracker under `config.tracker_dir`.
    pub fn new(config: RunConfig) -> Self {
        let tracker = Box::new(CsvTracker::new(config.tracker_dir.clone()));
        Self::with_tracker(config, tracker)
    }

    /// Track metrics with a caller-supplied backend.
    pub fn with_tracker(config: RunConfig, tracker: Box<dyn ExperimentTracker>) -> Self {
        Self { config, tracker }
    }

    /// Run training end to end. Returns the run directory.
    pub fn execute(self) -> Result<PathBuf> {
        let cfg = &self.config;

        // ── Step 1: Reject bad arguments up front ────────────────────────────
        cfg.validate()?;

        // ── Step 2: Read the caption index ───────────────────────────────────
        let corpus = CorpusLoader::new(cfg.image_dir.clone(), &cfg.captions_file);
        let pairs  = corpus.load_pairs()?;

        // ── Step 3: Vocabulary ───────────────────────────────────────────────
        let (vocab, source) = provision_vocab(cfg, &pairs)?;

        // ── Step 4 + 5: Run directory, configuration first ───────────────────
        let mut ckpt = CheckpointManager::create(&cfg.model_path, &cfg.name)?;
        ckpt.save_config(cfg)?;
        if source == VocabSource::Built {
            ckpt.save_vocab(&vocab)?;
        }

        // ── Step 6: Tracking (best effort) ───────────────────────────────────
        tracing::info!("Run '{}': {}", cfg.name, cfg.notes);
        let tracker = TrackerHandle::start(self.tracker, &cfg.name);

        // ── Step 7: Dataset ──────────────────────────────────────────────────
        let transform = ImageTransform::new(cfg.crop_size, cfg.horizontal_flip);
        let dataset   = CaptionDataset::new(
            &pairs,
            corpus.image_dir(),
            &vocab,
            transform,
            cfg.max_caption_len,
        )?;

        // ── Step 8: Train on the selected device ─────────────────────────────
        match DeviceSelection::select(cfg.cpu) {
            DeviceSelection::Accelerator(device) => {
                train_on::<Autodiff<Wgpu>>(cfg, device, dataset, vocab.len(), tracker, &mut ckpt)?
            }
            DeviceSelection::Host(device) => {
                train_on::<Autodiff<NdArray>>(cfg, device, dataset, vocab.len(), tracker, &mut ckpt)?
            }
        }

        Ok(ckpt.run_dir().to_path_buf())
    }
}

/// Load the vocabulary from `vocab_path`, or build it from the
/// corpus when no path was given.
pub fn provision_vocab(cfg: &RunConfig, pairs: &[CaptionPair]) -> Result<(Vocabulary, VocabSource)> {
    match &cfg.vocab_path {
        Some(path) => Ok((load_vocab(path)?, VocabSource::Loaded)),
        None => {
            let vocab = build_vocab(pairs.iter().map(|p| p.caption.as_str()), cfg.vocab_threshold)?;
            Ok((vocab, VocabSource::Built))
        }
    }
}

fn train_on<B: AutodiffBackend>(
    cfg:        &RunConfig,
    device:     B::Device,
    dataset:    CaptionDataset,
    vocab_size: usize,
    tracker:    TrackerHandle,
    ckpt:       &mut CheckpointManager,
) -> Result<()> {
    B::seed(cfg.seed);
    let ctx = ComputeContext::<B>::new(device);

    let model  = build_model::<B>(cfg, vocab_size, ctx.device())?;
    let loader = BatchLoader::new(dataset, &ctx, cfg);
    tracing::info!(
        "{} samples, batch size {}, {} workers",
        loader.num_items(),
        cfg.batch_size,
        cfg.num_workers
    );

    TrainingLoop::new(cfg, ctx, tracker, ckpt).run(model, &loader)?;
    Ok(())
}

/// Fresh captioning model with the backbone optionally restored
/// from `backbone_path`, then frozen.
pub fn build_model<B: AutodiffBackend>(
    cfg:        &RunConfig,
    vocab_size: usize,
    device:     &B::Device,
) -> Result<CaptionModel<B>> {
    let model_cfg = CaptionModelConfig::new(vocab_size, cfg.embed_size, cfg.hidden_size, cfg.num_layers);
    let mut model: CaptionModel<B> = model_cfg.init(device);

    if let Some(path) = &cfg.backbone_path {
        model.encoder.backbone = load_module(model.encoder.backbone, path, device)?;
    }
    model.encoder = model.encoder.freeze_backbone();

    tracing::info!(
        "Model ready: {} parameters, {} of them in the frozen backbone",
        model.num_params(),
        model.encoder.backbone.num_params()
    );
    Ok(model)
}
