// ============================================================
// Layer 4 — Caption Dataset
// ============================================================
// Implements Burn's Dataset trait over the caption corpus.
// Captions are tokenised once at construction; images are
// decoded on demand, one item per `get`.

use anyhow::Result;
use burn::data::dataset::Dataset;
use std::path::{Path, PathBuf};

use crate::data::{transform::ImageTransform, vocabulary::Vocabulary};
use crate::domain::caption::CaptionPair;

/// One decoded training example: normalised CHW pixels plus
/// the caption as `<start> … <end>` token ids.
#[derive(Debug, Clone)]
pub struct CaptionItem {
    pub pixels:    Vec<f32>,
    pub token_ids: Vec<u32>,
}

#[derive(Debug, Clone)]
struct Entry {
    image:     PathBuf,
    token_ids: Vec<u32>,
}

/// Captions are tokenised up front; images are decoded lazily in
/// `get`, which the data loader calls from its worker threads.
pub struct CaptionDataset {
    entries:   Vec<Entry>,
    transform: ImageTransform,
}

impl CaptionDataset {
    pub fn new(
        pairs:           &[CaptionPair],
        image_dir:       &Path,
        vocab:           &Vocabulary,
        transform:       ImageTransform,
        max_caption_len: Option<usize>,
    ) -> Result<Self> {
        let entries = pairs
            .iter()
            .map(|pair| {
                Ok(Entry {
                    image:     image_dir.join(&pair.image),
                    token_ids: vocab.encode_caption(&pair.caption, max_caption_len)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries, transform })
    }

    pub fn transform(&self) -> ImageTransform {
        self.transform
    }
}

impl Dataset<CaptionItem> for CaptionDataset {
    fn get(&self, index: usize) -> Option<CaptionItem> {
        let entry = self.entries.get(index)?;
        match self.transform.load(&entry.image) {
            Ok(pixels) => Some(CaptionItem {
                pixels,
                token_ids: entry.token_ids.clone(),
            }),
            // The loader ends the epoch early on `None`; the training
            // loop turns that short epoch into an error.
            Err(e) => {
                tracing::error!("{e:#}");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocabulary::{END_ID, START_ID};
    use crate::infra::vocab_store::build_vocab;

    #[test]
    fn test_items_carry_pixels_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(5, 5).save(dir.path().join("x.png")).unwrap();

        let pairs = vec![CaptionPair::new("x.png", "a black square")];
        let vocab = build_vocab(pairs.iter().map(|p| p.caption.as_str()), 1).unwrap();
        let ds    = CaptionDataset::new(&pairs, dir.path(), &vocab, ImageTransform::new(8, false), None)
            .unwrap();

        assert_eq!(ds.len(), 1);
        let item = ds.get(0).unwrap();
        assert_eq!(item.pixels.len(), 3 * 8 * 8);
        assert_eq!(item.token_ids.first(), Some(&START_ID));
        assert_eq!(item.token_ids.last(),  Some(&END_ID));
        assert_eq!(item.token_ids.len(), 5);
        assert!(ds.get(1).is_none());
    }

    #[test]
    fn test_undecodable_image_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"garbage").unwrap();

        let pairs = vec![CaptionPair::new("bad.png", "nothing")];
        let vocab = build_vocab(["nothing"].iter().copied(), 1).unwrap();
        let ds    = CaptionDataset::new(&pairs, dir.path(), &vocab, ImageTransform::new(8, false), None)
            .unwrap();

        assert!(ds.get(0).is_none());
    }
}
