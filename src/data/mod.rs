// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the caption index on disk to device-ready
// tensor batches.
//
// The pipeline flows in this order:
//
//   captions.json + images
//       │
//       ▼
//   CorpusLoader      → reads the index, checks every image header
//       │
//       ▼
//   Vocabulary        → caption text → <start> … <end> token ids
//       │
//       ▼
//   CaptionDataset    → Burn Dataset; decodes + normalises images
//       │
//       ▼
//   CaptionBatcher    → sorts by length, pads, stacks into tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop

/// Reads the JSON caption index and validates image files
pub mod loader;

/// Token ↔ id mapping with reserved <pad>/<start>/<end>/<unk>
pub mod vocabulary;

/// Decode, resize, flip and normalise images
pub mod transform;

/// Implements Burn's Dataset trait for image/caption items
pub mod dataset;

/// Implements Burn's Batcher trait: sort, pad, stack
pub mod batcher;
