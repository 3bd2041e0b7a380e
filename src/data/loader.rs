// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads the caption index that sits next to the images.
//
// Expected layout:
//   {image_dir}/
//     captions.json    ← [{ "image": "0001.jpg", "caption": "..." }, ...]
//     0001.jpg
//     0002.jpg
//     ...
//
// Every referenced image must exist and have a readable header.
// A bad entry is a data error for the whole run: skipping it
// would silently change what the model is trained on.

use anyhow::{ensure, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::caption::CaptionPair;
use crate::domain::traits::CorpusSource;

/// Loads image/caption pairs from a JSON caption index.
pub struct CorpusLoader {
    image_dir:     PathBuf,
    captions_path: PathBuf,
}

impl CorpusLoader {
    pub fn new(image_dir: impl Into<PathBuf>, captions_file: &str) -> Self {
        let image_dir     = image_dir.into();
        let captions_path = image_dir.join(captions_file);
        Self { image_dir, captions_path }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }
}

impl CorpusSource for CorpusLoader {
    fn load_pairs(&self) -> Result<Vec<CaptionPair>> {
        let json = fs::read_to_string(&self.captions_path).with_context(|| {
            format!("Cannot read caption index '{}'", self.captions_path.display())
        })?;

        let pairs: Vec<CaptionPair> = serde_json::from_str(&json).with_context(|| {
            format!("Malformed caption index '{}'", self.captions_path.display())
        })?;

        ensure!(
            !pairs.is_empty(),
            "Caption index '{}' lists no image/caption pairs",
            self.captions_path.display()
        );

        // Header-only read: cheap, but catches missing and non-image files
        for pair in &pairs {
            let path = self.image_dir.join(&pair.image);
            image::image_dimensions(&path)
                .with_context(|| format!("Cannot read image '{}'", path.display()))?;
        }

        tracing::info!(
            "Loaded {} image/caption pairs from '{}'",
            pairs.len(),
            self.captions_path.display()
        );
        Ok(pairs)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(dir: &Path, name: &str) {
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_loads_index_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png");
        write_image(dir.path(), "b.png");
        fs::write(
            dir.path().join("captions.json"),
            r#"[{"image":"a.png","caption":"first"},{"image":"b.png","caption":"second"}]"#,
        )
        .unwrap();

        let pairs = CorpusLoader::new(dir.path(), "captions.json").load_pairs().unwrap();
        assert_eq!(pairs, vec![
            CaptionPair::new("a.png", "first"),
            CaptionPair::new("b.png", "second"),
        ]);
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("captions.json"),
            r#"[{"image":"missing.png","caption":"nothing here"}]"#,
        )
        .unwrap();

        assert!(CorpusLoader::new(dir.path(), "captions.json").load_pairs().is_err());
    }

    #[test]
    fn test_empty_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("captions.json"), "[]").unwrap();
        assert!(CorpusLoader::new(dir.path(), "captions.json").load_pairs().is_err());
    }
}
