// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `build-vocab`, and
// all their flags. Defaults mirror `RunConfig::default()`.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::run_config::RunConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the captioning model on an image/caption corpus
    Train(TrainArgs),

    /// Build a vocabulary file from a corpus for reuse across runs
    BuildVocab(BuildVocabArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Run name; snapshots go to {model_path}/{name}/
    #[arg(long)]
    pub name: String,

    /// Free-text description of what this run tries
    #[arg(long)]
    pub notes: String,

    /// Root directory for run directories
    #[arg(long, default_value = "models")]
    pub model_path: PathBuf,

    /// Pre-built vocabulary; when absent one is built and saved
    #[arg(long)]
    pub vocab_path: Option<PathBuf>,

    /// Directory holding the images and the caption index
    #[arg(long, default_value = "data/resized2014")]
    pub image_dir: PathBuf,

    /// Caption index file name, relative to --image-dir
    #[arg(long, default_value = "captions.json")]
    pub captions_file: String,

    /// Root directory of the metrics tracker
    #[arg(long, default_value = "runs")]
    pub tracker_dir: PathBuf,

    /// CompactRecorder file with pre-trained backbone weights
    #[arg(long)]
    pub backbone_path: Option<PathBuf>,

    /// Side length images are resized to
    #[arg(long, default_value_t = 224)]
    pub crop_size: usize,

    /// Randomly mirror training images
    #[arg(long)]
    pub horizontal_flip: bool,

    /// Minimum word count for the built vocabulary
    #[arg(long, default_value_t = 1)]
    pub vocab_threshold: usize,

    /// Truncate captions to this many tokens, <start> and <end> included
    #[arg(long)]
    pub max_caption_len: Option<usize>,

    /// Width of the image embedding and word vectors
    #[arg(long, default_value_t = 256)]
    pub embed_size: usize,

    /// LSTM hidden width
    #[arg(long, default_value_t = 512)]
    pub hidden_size: usize,

    /// Stacked LSTM layers
    #[arg(long, default_value_t = 1)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 5)]
    pub num_epochs: usize,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Data loader worker threads (0 = load on the training thread)
    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Shuffle and initialisation seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Log a progress line every N steps
    #[arg(long, default_value_t = 10)]
    pub log_step: usize,

    /// Snapshot encoder and decoder every N steps
    #[arg(long, default_value_t = 1000)]
    pub save_step: usize,

    /// Train on the CPU even if a GPU is available
    #[arg(long)]
    pub cpu: bool,
}

/// Layer 1 → Layer 2 boundary: the application never sees clap types.
impl From<TrainArgs> for RunConfig {
    fn from(a: TrainArgs) -> Self {
        RunConfig {
            name:            a.name,
            notes:           a.notes,
            model_path:      a.model_path,
            vocab_path:      a.vocab_path,
            image_dir:       a.image_dir,
            captions_file:   a.captions_file,
            tracker_dir:     a.tracker_dir,
            backbone_path:   a.backbone_path,
            crop_size:       a.crop_size,
            horizontal_flip: a.horizontal_flip,
            vocab_threshold: a.vocab_threshold,
            max_caption_len: a.max_caption_len,
            embed_size:      a.embed_size,
            hidden_size:     a.hidden_size,
            num_layers:      a.num_layers,
            num_epochs:      a.num_epochs,
            batch_size:      a.batch_size,
            num_workers:     a.num_workers,
            learning_rate:   a.learning_rate,
            seed:            a.seed,
            log_step:        a.log_step,
            save_step:       a.save_step,
            cpu:             a.cpu,
        }
    }
}

/// All arguments for the `build-vocab` command
#[derive(Args, Debug)]
pub struct BuildVocabArgs {
    #[arg(long, default_value = "data/resized2014")]
    pub image_dir: PathBuf,

    #[arg(long, default_value = "captions.json")]
    pub captions_file: String,

    /// Minimum word count for vocabulary membership
    #[arg(long, default_value_t = 1)]
    pub threshold: usize,

    /// Where to write the vocabulary
    #[arg(long, default_value = "data/vocab.json")]
    pub output: PathBuf,
}
