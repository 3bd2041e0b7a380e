// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything a run writes outside of tensors:
//
//   checkpoint.rs  — Run directory owner
//                    parameters.json, vocab.json and the
//                    encoder/decoder snapshots (CompactRecorder)
//
//   vocab_store.rs — Vocabulary build / save / load
//                    Tokenizer JSON via the `tokenizers` crate
//
//   tracker.rs     — Experiment tracking
//                    Per-step metrics in a CSV per run, behind a
//                    handle that never fails the training loop
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Run directory and model snapshots
pub mod checkpoint;

/// Vocabulary persistence and construction
pub mod vocab_store;

/// Metric recording per named run
pub mod tracker;
