// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to Layer 2.
//
//   1. `train`       — runs one training experiment
//   2. `build-vocab` — writes a reusable vocabulary file
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BuildVocabArgs, Commands, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "caption-trainer",
    version,
    about = "Train a CNN encoder / LSTM decoder image captioning model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)      => run_train(args),
            Commands::BuildVocab(args) => run_build_vocab(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting run '{}' on images in '{}'", args.name, args.image_dir.display());
    let run_dir = TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Snapshots in '{}'.", run_dir.display());
    Ok(())
}

fn run_build_vocab(args: BuildVocabArgs) -> Result<()> {
    use crate::application::vocab_use_case::BuildVocabUseCase;

    let use_case = BuildVocabUseCase {
        image_dir:     args.image_dir,
        captions_file: args.captions_file,
        threshold:     args.threshold,
        output:        args.output,
    };
    let size = use_case.execute()?;

    println!("Wrote {} tokens to '{}'.", size, use_case.output.display());
    Ok(())
}
