// ============================================================
// Layer 3 — CaptionPair Domain Type
// ============================================================
// A single supervised example for the captioning model:
// an image file (relative to the corpus directory) and one
// human-written caption describing it.
//
// The same image usually appears several times in a corpus,
// once per reference caption.

use serde::{Deserialize, Serialize};

/// One image/caption pair as listed in the corpus index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionPair {
    /// Image file name, relative to the corpus image directory
    pub image: String,

    /// Free-text caption for the image
    pub caption: String,
}

impl CaptionPair {
    pub fn new(image: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            image:   image.into(),
            caption: caption.into(),
        }
    }
}
