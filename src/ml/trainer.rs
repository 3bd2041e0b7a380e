// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives epochs over Burn's DataLoader with Adam.
//
// Per batch, strictly in sequence:
//   place on device → pack targets → encoder/decoder forward
//   → cross-entropy → backward → Adam step
//   → tracker (every step) → log line (every log_step)
//   → encoder/decoder snapshot (every save_step)
//
// After the last batch of the last epoch one more snapshot is
// forced, whatever the cadence.
//
// Burn builds a fresh gradient set on every `backward()`, so
// there is nothing to zero between steps. The frozen backbone
// never appears in that set, which keeps it out of Adam's state.

use anyhow::{bail, ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::sync::Arc;

use crate::application::run_config::RunConfig;
use crate::data::{
    batcher::{CaptionBatch, CaptionBatcher},
    dataset::CaptionDataset,
};
use crate::infra::{checkpoint::CheckpointManager, tracker::TrackerHandle};
use crate::ml::{device::ComputeContext, model::CaptionModel, packing::pack_tokens};

pub const ENCODER: &str = "encoder";
pub const DECODER: &str = "decoder";

// ─── BatchLoader ──────────────────────────────────────────────────────────────
/// Burn DataLoader plus the number of batches one epoch yields.
pub struct BatchLoader<B: Backend> {
    inner:       Arc<dyn DataLoader<CaptionBatch<B>>>,
    num_items:   usize,
    total_steps: usize,
}

impl<B: Backend> BatchLoader<B> {
    pub fn new(dataset: CaptionDataset, ctx: &ComputeContext<B>, cfg: &RunConfig) -> Self {
        let batcher = CaptionBatcher::<B>::new(ctx.device().clone(), dataset.transform().size());
        let num_items = burn::data::dataset::Dataset::len(&dataset);

        let mut builder = DataLoaderBuilder::new(batcher)
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed);
        if cfg.num_workers > 0 {
            builder = builder.num_workers(cfg.num_workers);
        }

        Self {
            inner: builder.build(dataset),
            num_items,
            total_steps: batches_per_epoch(num_items, cfg.batch_size, cfg.num_workers),
        }
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Batches per epoch.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

/// Batches one epoch yields. With workers, Burn splits the dataset
/// into `num_workers` contiguous parts (equal floor-sized parts, the
/// remainder going to the last) and batches each part on its own,
/// so every part can end in a short batch.
pub fn batches_per_epoch(num_items: usize, batch_size: usize, num_workers: usize) -> usize {
    if num_workers == 0 {
        return num_items.div_ceil(batch_size);
    }
    let part = num_items / num_workers;
    let last = num_items - part * (num_workers - 1);
    part.div_ceil(batch_size) * (num_workers - 1) + last.div_ceil(batch_size)
}

// ─── TrainingLoop ─────────────────────────────────────────────────────────────
pub struct TrainingLoop<'a, B: AutodiffBackend> {
    cfg:         &'a RunConfig,
    ctx:         ComputeContext<B>,
    tracker:     TrackerHandle,
    checkpoints: &'a mut CheckpointManager,
}

impl<'a, B: AutodiffBackend> TrainingLoop<'a, B> {
    pub fn new(
        cfg:         &'a RunConfig,
        ctx:         ComputeContext<B>,
        tracker:     TrackerHandle,
        checkpoints: &'a mut CheckpointManager,
    ) -> Self {
        Self { cfg, ctx, tracker, checkpoints }
    }

    /// Train for `num_epochs` full passes and return the final model.
    /// Any error aborts the run; the last snapshot on disk is the
    /// recovery point.
    pub fn run(mut self, mut model: CaptionModel<B>, loader: &BatchLoader<B>) -> Result<CaptionModel<B>> {
        let cfg         = self.cfg;
        let total_steps = loader.total_steps();
        ensure!(total_steps > 0, "the batch loader yields no batches");

        let mut optim = AdamConfig::new().init::<B, CaptionModel<B>>();
        let loss_fn   = CrossEntropyLossConfig::new().init(self.ctx.device());

        tracing::info!(
            "Training for {} epochs, {} steps per epoch, tracking {}",
            cfg.num_epochs,
            total_steps,
            if self.tracker.is_enabled() { "on" } else { "off" }
        );

        for epoch in 0..cfg.num_epochs {
            let mut steps = 0usize;
            let mut seen  = 0usize;

            for (i, batch) in loader.inner.iter().enumerate() {
                let batch = self.ctx.place_batch(batch);
                batch.validate()?;
                seen += batch.batch_size();

                // ── Forward ───────────────────────────────────────────────────
                let targets = pack_tokens(batch.captions.clone(), &batch.lengths)?;
                let logits  = model.forward(batch.images, batch.captions, &batch.lengths)?;
                ensure!(
                    logits.dims()[0] == targets.dims()[0],
                    "decoder produced {} rows for {} packed targets",
                    logits.dims()[0],
                    targets.dims()[0]
                );

                // ── Loss ──────────────────────────────────────────────────────
                let loss = loss_fn.forward(logits, targets);
                let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();
                if !loss_value.is_finite() {
                    bail!("Loss diverged to {loss_value} at epoch {epoch}, step {i}");
                }
                let perplexity = loss_value.exp();

                // ── Backward + Adam update ────────────────────────────────────
                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(cfg.learning_rate, model, grads);

                // ── Metrics ───────────────────────────────────────────────────
                let global_step = epoch * total_steps + i;
                self.tracker.record("train_loss", loss_value, global_step);
                self.tracker.record("perplexity", perplexity, global_step);

                if i % cfg.log_step == 0 {
                    tracing::info!(
                        "Epoch [{}/{}], Step [{}/{}], Loss: {:.4}, Perplexity: {:5.4}",
                        epoch, cfg.num_epochs, i, total_steps, loss_value, perplexity,
                    );
                }

                // ── Checkpoint ────────────────────────────────────────────────
                if (i + 1) % cfg.save_step == 0 {
                    self.snapshot(&model, epoch + 1, i + 1)?;
                }

                steps += 1;
            }

            // A sample that fails to load ends Burn's epoch early
            ensure!(
                steps == total_steps && seen == loader.num_items(),
                "epoch {} yielded {steps} batches ({seen} samples), expected {total_steps} ({})",
                epoch + 1,
                loader.num_items()
            );
        }

        self.snapshot(&model, cfg.num_epochs, total_steps)?;
        tracing::info!("Training complete, {} snapshots written", self.checkpoints.snapshots_saved());
        Ok(model)
    }

    fn snapshot(&mut self, model: &CaptionModel<B>, epoch: usize, step: usize) -> Result<()> {
        self.checkpoints.save::<B, _>(ENCODER, &model.encoder, epoch, step)?;
        self.checkpoints.save::<B, _>(DECODER, &model.decoder, epoch, step)?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use std::{cell::RefCell, path::Path, rc::Rc};

    use crate::data::transform::ImageTransform;
    use crate::domain::{caption::CaptionPair, traits::ExperimentTracker};
    use crate::infra::vocab_store::build_vocab;
    use crate::ml::model::CaptionModelConfig;

    type TestBackend = Autodiff<NdArray>;

    type Samples = Rc<RefCell<Vec<(String, f64, usize)>>>;

    struct Recording(Samples);

    impl ExperimentTracker for Recording {
        fn start_run(&mut self, _name: &str) -> Result<()> {
            self.0.borrow_mut().clear();
            Ok(())
        }

        fn record(&mut self, metric: &str, value: f64, step: usize) -> Result<()> {
            self.0.borrow_mut().push((metric.to_string(), value, step));
            Ok(())
        }
    }

    fn config(model_path: &Path) -> RunConfig {
        RunConfig {
            name:        "e2e".to_string(),
            notes:       "one pair, four times".to_string(),
            model_path:  model_path.to_path_buf(),
            crop_size:   16,
            embed_size:  8,
            hidden_size: 8,
            num_epochs:  1,
            batch_size:  4,
            num_workers: 0,
            log_step:    1,
            save_step:   1,
            ..RunConfig::default()
        }
    }

    fn dataset(dir: &Path, images: &[&str], cfg: &RunConfig) -> CaptionDataset {
        let pairs: Vec<CaptionPair> = images
            .iter()
            .map(|img| CaptionPair::new(*img, "a red square on a table"))
            .collect();
        let vocab = build_vocab(pairs.iter().map(|p| p.caption.as_str()), 1).unwrap();
        CaptionDataset::new(&pairs, dir, &vocab, ImageTransform::new(cfg.crop_size, false), None).unwrap()
    }

    fn model(cfg: &RunConfig) -> CaptionModel<TestBackend> {
        // 5 words + 4 reserved
        CaptionModelConfig::new(9, cfg.embed_size, cfg.hidden_size, cfg.num_layers)
            .with_backbone_channels(8)
            .init(&NdArrayDevice::Cpu)
    }

    #[test]
    fn test_single_batch_run_records_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(20, 20, image::Rgb([200, 10, 10]))
            .save(dir.path().join("red.png"))
            .unwrap();

        let cfg = config(&dir.path().join("models"));
        let ctx = ComputeContext::<TestBackend>::new(NdArrayDevice::Cpu);
        let loader = BatchLoader::new(dataset(dir.path(), &["red.png"; 4], &cfg), &ctx, &cfg);
        assert_eq!(loader.total_steps(), 1);

        let mut ckpt = CheckpointManager::create(&cfg.model_path, &cfg.name).unwrap();
        ckpt.save_config(&cfg).unwrap();

        let samples: Samples = Rc::default();
        let tracker = TrackerHandle::start(Box::new(Recording(samples.clone())), &cfg.name);

        TrainingLoop::new(&cfg, ctx, tracker, &mut ckpt)
            .run(model(&cfg), &loader)
            .unwrap();

        let samples = samples.borrow();
        assert_eq!(samples.len(), 2);
        assert_eq!((samples[0].0.as_str(), samples[0].2), ("train_loss", 0));
        assert_eq!((samples[1].0.as_str(), samples[1].2), ("perplexity", 0));
        assert!((samples[1].1 - samples[0].1.exp()).abs() < 1e-6 * samples[1].1);

        // cadence and final snapshot both land on (1, 1)
        assert_eq!(ckpt.snapshots_saved(), 4);
        assert!(ckpt.snapshot_path(ENCODER, 1, 1).exists());
        assert!(ckpt.snapshot_path(DECODER, 1, 1).exists());
    }

    #[test]
    fn test_final_checkpoint_forced_off_cadence() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(20, 20, image::Rgb([0, 0, 255]))
            .save(dir.path().join("blue.png"))
            .unwrap();

        let cfg = RunConfig {
            num_epochs: 2,
            batch_size: 1,
            save_step:  100,
            log_step:   10,
            ..config(&dir.path().join("models"))
        };
        let ctx = ComputeContext::<TestBackend>::new(NdArrayDevice::Cpu);
        let loader = BatchLoader::new(dataset(dir.path(), &["blue.png"; 3], &cfg), &ctx, &cfg);
        assert_eq!(loader.total_steps(), 3);

        let mut ckpt = CheckpointManager::create(&cfg.model_path, &cfg.name).unwrap();
        ckpt.save_config(&cfg).unwrap();

        let samples: Samples = Rc::default();
        let tracker = TrackerHandle::start(Box::new(Recording(samples.clone())), &cfg.name);
        TrainingLoop::new(&cfg, ctx, tracker, &mut ckpt)
            .run(model(&cfg), &loader)
            .unwrap();

        // Only the forced final pair
        assert_eq!(ckpt.snapshots_saved(), 2);
        assert!(ckpt.snapshot_path(ENCODER, 2, 3).exists());

        // Global steps 0..6, each with loss then perplexity
        let steps: Vec<usize> = samples.borrow().iter().map(|s| s.2).collect();
        assert_eq!(steps, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_batches_per_epoch_follows_worker_split() {
        assert_eq!(batches_per_epoch(10, 4, 0), 3);
        // 5 + 5, each batched as 4 + 1
        assert_eq!(batches_per_epoch(10, 4, 2), 4);
        assert_eq!(batches_per_epoch(300, 128, 2), 4);
        // 3 + 3 + 4
        assert_eq!(batches_per_epoch(10, 3, 3), 5);
        // fewer items than workers: only the last part is non-empty
        assert_eq!(batches_per_epoch(1, 4, 2), 1);
        assert_eq!(batches_per_epoch(8, 4, 2), 2);
    }

    #[test]
    fn test_worker_loader_completes_uneven_epochs() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(20, 20, image::Rgb([10, 200, 10]))
            .save(dir.path().join("green.png"))
            .unwrap();

        let cfg = RunConfig {
            num_epochs:  2,
            num_workers: 2,
            save_step:   100,
            log_step:    10,
            ..config(&dir.path().join("models"))
        };
        let ctx = ComputeContext::<TestBackend>::new(NdArrayDevice::Cpu);
        let loader = BatchLoader::new(dataset(dir.path(), &["green.png"; 10], &cfg), &ctx, &cfg);
        assert_eq!(loader.total_steps(), 4);

        let mut ckpt = CheckpointManager::create(&cfg.model_path, &cfg.name).unwrap();
        ckpt.save_config(&cfg).unwrap();

        let samples: Samples = Rc::default();
        let tracker = TrackerHandle::start(Box::new(Recording(samples.clone())), &cfg.name);
        TrainingLoop::new(&cfg, ctx, tracker, &mut ckpt)
            .run(model(&cfg), &loader)
            .unwrap();

        assert_eq!(ckpt.snapshots_saved(), 2);
        assert!(ckpt.snapshot_path(DECODER, 2, 4).exists());

        let steps: Vec<usize> = samples.borrow().iter().map(|s| s.2).step_by(2).collect();
        assert_eq!(steps, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_non_finite_loss_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(20, 20, image::Rgb([90, 90, 90]))
            .save(dir.path().join("grey.png"))
            .unwrap();

        // One update at this rate drives the parameters to inf/NaN
        let cfg = RunConfig {
            batch_size:    1,
            save_step:     100,
            learning_rate: f64::MAX,
            ..config(&dir.path().join("models"))
        };
        let ctx = ComputeContext::<TestBackend>::new(NdArrayDevice::Cpu);
        let loader = BatchLoader::new(dataset(dir.path(), &["grey.png"; 3], &cfg), &ctx, &cfg);

        let mut ckpt = CheckpointManager::create(&cfg.model_path, &cfg.name).unwrap();
        ckpt.save_config(&cfg).unwrap();

        let err = TrainingLoop::new(&cfg, ctx, TrackerHandle::disabled(), &mut ckpt)
            .run(model(&cfg), &loader)
            .unwrap_err();
        assert!(err.to_string().contains("Loss diverged"), "{err:#}");
        assert_eq!(ckpt.snapshots_saved(), 0);
    }

    #[test]
    fn test_checkpoint_write_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(20, 20).save(dir.path().join("black.png")).unwrap();

        let cfg = config(&dir.path().join("models"));
        let ctx = ComputeContext::<TestBackend>::new(NdArrayDevice::Cpu);
        let loader = BatchLoader::new(dataset(dir.path(), &["black.png"; 4], &cfg), &ctx, &cfg);

        let mut ckpt = CheckpointManager::create(&cfg.model_path, &cfg.name).unwrap();
        ckpt.save_config(&cfg).unwrap();
        // A directory squatting on the snapshot's file name
        std::fs::create_dir_all(ckpt.snapshot_path(ENCODER, 1, 1)).unwrap();

        let result = TrainingLoop::new(&cfg, ctx, TrackerHandle::disabled(), &mut ckpt)
            .run(model(&cfg), &loader);
        assert!(result.is_err());
        assert_eq!(ckpt.snapshots_saved(), 0);
    }

    #[test]
    fn test_unloadable_image_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(20, 20).save(dir.path().join("ok.png")).unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();

        let cfg = RunConfig {
            batch_size: 2,
            save_step:  100,
            ..config(&dir.path().join("models"))
        };
        let ctx = ComputeContext::<TestBackend>::new(NdArrayDevice::Cpu);
        let loader = BatchLoader::new(
            dataset(dir.path(), &["ok.png", "ok.png", "broken.png", "ok.png"], &cfg),
            &ctx,
            &cfg,
        );

        let mut ckpt = CheckpointManager::create(&cfg.model_path, &cfg.name).unwrap();
        ckpt.save_config(&cfg).unwrap();

        let result = TrainingLoop::new(&cfg, ctx, TrackerHandle::disabled(), &mut ckpt)
            .run(model(&cfg), &loader);
        assert!(result.is_err());
        // The forced final snapshot is never reached
        assert_eq!(ckpt.snapshots_saved(), 0);
    }
}
