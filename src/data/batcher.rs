// ============================================================
// Layer 4 — Caption Batcher
// ============================================================
// Implements Burn's Batcher trait to stack CaptionItems into
// one tensor batch.
//
// Captions have different lengths, so the batcher:
//   1. Sorts items by caption length, longest first
//   2. Pads every caption with <pad> up to the longest one
//   3. Records the real length of each caption
//
// Output for N items whose longest caption has T tokens:
//   images   [N, 3, S, S]   f32
//   captions [N, T]         int, <pad>-filled
//   lengths  [N]            non-increasing, each ≤ T
//
// The descending order is what lets the decoder's packed
// outputs line up with the packed targets.

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::{dataset::CaptionItem, transform::CHANNELS, vocabulary::PAD_ID};

// ─── CaptionBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CaptionBatch<B: Backend> {
    /// Normalised images — shape: [batch_size, 3, size, size]
    pub images: Tensor<B, 4>,

    /// Token ids — shape: [batch_size, max_len], <pad> after each caption
    pub captions: Tensor<B, 2, Int>,

    /// Real caption lengths, longest first
    pub lengths: Vec<usize>,
}

impl<B: Backend> CaptionBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Check the shape invariants the loss computation relies on.
    pub fn validate(&self) -> Result<()> {
        let [images_n, channels, _, _] = self.images.dims();
        let [captions_n, max_len]      = self.captions.dims();
        let n = self.lengths.len();

        ensure!(n > 0, "empty batch");
        ensure!(
            images_n == n && captions_n == n,
            "batch size mismatch: {images_n} images, {captions_n} captions, {n} lengths"
        );
        ensure!(channels == CHANNELS, "expected {CHANNELS} image channels, got {channels}");
        ensure!(
            self.lengths.windows(2).all(|w| w[0] >= w[1]),
            "caption lengths are not sorted longest first: {:?}",
            self.lengths
        );
        ensure!(
            self.lengths.iter().all(|&len| len > 0 && len <= max_len),
            "caption lengths {:?} outside 1..={max_len}",
            self.lengths
        );
        Ok(())
    }
}

// ─── CaptionBatcher ───────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the
/// active GPU/CPU directly.
#[derive(Clone, Debug)]
pub struct CaptionBatcher<B: Backend> {
    device:     B::Device,
    image_size: usize,
}

impl<B: Backend> CaptionBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<CaptionItem, CaptionBatch<B>> for CaptionBatcher<B> {
    fn batch(&self, mut items: Vec<CaptionItem>) -> CaptionBatch<B> {
        // Stable sort: equal-length captions keep loader order
        items.sort_by(|a, b| b.token_ids.len().cmp(&a.token_ids.len()));

        let batch_size = items.len();
        let lengths: Vec<usize> = items.iter().map(|item| item.token_ids.len()).collect();
        let max_len = lengths.first().copied().unwrap_or(0);

        // ── Pixels: concatenate CHW buffers, then reshape ────────────────────
        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, CHANNELS, self.image_size, self.image_size]);

        // ── Captions: right-pad each row with <pad> ──────────────────────────
        let mut padded = Vec::with_capacity(batch_size * max_len);
        for item in &items {
            padded.extend(item.token_ids.iter().map(|&id| id as i32));
            padded.extend(std::iter::repeat(PAD_ID as i32).take(max_len - item.token_ids.len()));
        }

        let captions = Tensor::<B, 1, Int>::from_ints(padded.as_slice(), &self.device)
            .reshape([batch_size, max_len]);

        CaptionBatch { images, captions, lengths }
    }
}
