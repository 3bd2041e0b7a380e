// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, runs or updates tensors lives here.
//
//   model.rs    — EncoderCnn + DecoderRnn captioning model
//   packing.rs  — padded batch → flat non-padding sequence
//   device.rs   — device selection and the compute context
//   trainer.rs  — batch loader and the training loop
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vinyals et al. (2015) Show and Tell

/// Encoder / decoder architecture
pub mod model;

/// Index-gather packing of variable-length sequences
pub mod packing;

/// Accelerator or host, chosen once per process
pub mod device;

/// Epoch/step loop with tracking and checkpointing
pub mod trainer;
