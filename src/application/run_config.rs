// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Every hyperparameter and path for one training invocation.
//
// A RunConfig is built once from the CLI arguments, validated,
// written verbatim to `{model_path}/{name}/parameters.json`,
// and never mutated afterwards.
//
// Fields are declared in the order they are serialised, so two
// runs with the same arguments produce byte-identical files.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    // ── Run identity ─────────────────────────────────────────
    pub name:            String,
    pub notes:           String,

    // ── Paths ────────────────────────────────────────────────
    pub model_path:      PathBuf,
    pub vocab_path:      Option<PathBuf>,
    pub image_dir:       PathBuf,
    pub captions_file:   String,
    pub tracker_dir:     PathBuf,
    pub backbone_path:   Option<PathBuf>,

    // ── Data pipeline ────────────────────────────────────────
    pub crop_size:       usize,
    pub horizontal_flip: bool,
    pub vocab_threshold: usize,
    pub max_caption_len: Option<usize>,

    // ── Model ────────────────────────────────────────────────
    pub embed_size:      usize,
    pub hidden_size:     usize,
    pub num_layers:      usize,

    // ── Optimisation ─────────────────────────────────────────
    pub num_epochs:      usize,
    pub batch_size:      usize,
    pub num_workers:     usize,
    pub learning_rate:   f64,
    pub seed:            u64,

    // ── Cadences (in steps within an epoch) ──────────────────
    pub log_step:        usize,
    pub save_step:       usize,

    // ── Execution ────────────────────────────────────────────
    pub cpu:             bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name:            String::new(),
            notes:           String::new(),
            model_path:      PathBuf::from("models"),
            vocab_path:      None,
            image_dir:       PathBuf::from("data/resized2014"),
            captions_file:   "captions.json".to_string(),
            tracker_dir:     PathBuf::from("runs"),
            backbone_path:   None,
            crop_size:       224,
            horizontal_flip: false,
            vocab_threshold: 1,
            max_caption_len: None,
            embed_size:      256,
            hidden_size:     512,
            num_layers:      1,
            num_epochs:      5,
            batch_size:      128,
            num_workers:     2,
            learning_rate:   1e-3,
            seed:            42,
            log_step:        10,
            save_step:       1000,
            cpu:             false,
        }
    }
}

impl RunConfig {
    /// Reject configurations that could never produce a valid run.
    /// Called before any directory is created or any tensor allocated.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.trim().is_empty(), "a run name is required (--name)");
        ensure!(!self.notes.trim().is_empty(), "run notes are required (--notes)");
        ensure!(
            !self.name.contains(['/', '\\']) && self.name != "." && self.name != "..",
            "run name '{}' must be a single path component",
            self.name
        );

        ensure!(self.batch_size  > 0, "batch size must be positive");
        ensure!(self.num_epochs  > 0, "epoch count must be positive");
        ensure!(self.log_step    > 0, "log step must be positive");
        ensure!(self.save_step   > 0, "save step must be positive");
        ensure!(self.embed_size  > 0, "embedding size must be positive");
        ensure!(self.hidden_size > 0, "hidden size must be positive");
        ensure!(self.num_layers  > 0, "layer count must be positive");
        ensure!(self.crop_size  >= 8, "crop size must be at least 8 pixels, got {}", self.crop_size);
        ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning rate must be a positive finite number, got {}",
            self.learning_rate
        );

        if let Some(max) = self.max_caption_len {
            // <start> and <end> alone take two positions
            ensure!(max >= 2, "max caption length must be at least 2, got {max}");
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn named() -> RunConfig {
        RunConfig {
            name:  "baseline".to_string(),
            notes: "first attempt".to_string(),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_defaults_with_identity_are_valid() {
        assert!(named().validate().is_ok());
    }

    #[test]
    fn test_missing_name_or_notes_rejected() {
        let mut cfg = named();
        cfg.name = "  ".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = named();
        cfg.notes.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_name_must_not_escape_model_root() {
        let mut cfg = named();
        cfg.name = "../elsewhere".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_cadence_rejected() {
        let mut cfg = named();
        cfg.save_step = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = named();
        cfg.log_step = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_learning_rate_rejected() {
        let mut cfg = named();
        cfg.learning_rate = f64::NAN;
        assert!(cfg.validate().is_err());
        cfg.learning_rate = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_serialisation_is_deterministic() {
        let a = serde_json::to_string_pretty(&named()).unwrap();
        let b = serde_json::to_string_pretty(&named()).unwrap();
        assert_eq!(a, b);

        // Field order follows the declaration order
        let name_at  = a.find("\"name\"").unwrap();
        let notes_at = a.find("\"notes\"").unwrap();
        let cpu_at   = a.find("\"cpu\"").unwrap();
        assert!(name_at < notes_at && notes_at < cpu_at);

        let back: RunConfig = serde_json::from_str(&a).unwrap();
        assert_eq!(back, named());
    }

    #[test]
    fn test_caption_length_must_fit_start_and_end() {
        let mut cfg = named();
        cfg.max_caption_len = Some(1);
        assert!(cfg.validate().is_err());
        cfg.max_caption_len = Some(2);
        assert!(cfg.validate().is_ok());
    }
}
