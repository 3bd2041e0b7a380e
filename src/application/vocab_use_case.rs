// ============================================================
// Layer 2 — BuildVocabUseCase
// ============================================================
// Builds a vocabulary from a caption corpus and writes it to a
// standalone file, so several runs can share it via
// `train --vocab-path`.

use anyhow::{ensure, Result};
use std::path::PathBuf;

use crate::data::loader::CorpusLoader;
use crate::domain::traits::CorpusSource;
use crate::infra::vocab_store::{build_vocab, save_vocab};

pub struct BuildVocabUseCase {
    pub image_dir:     PathBuf,
    pub captions_file: String,
    pub threshold:     usize,
    pub output:        PathBuf,
}

impl BuildVocabUseCase {
    /// Returns the number of tokens written, reserved ones included.
    pub fn execute(&self) -> Result<usize> {
        ensure!(self.threshold > 0, "vocabulary threshold must be positive");

        let pairs = CorpusLoader::new(self.image_dir.clone(), &self.captions_file).load_pairs()?;
        let vocab = build_vocab(pairs.iter().map(|p| p.caption.as_str()), self.threshold)?;
        save_vocab(&vocab, &self.output)?;
        Ok(vocab.len())
    }
}
