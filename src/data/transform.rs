// ============================================================
// Layer 4 — Image Transform
// ============================================================
// Turns an image file into the flat CHW float buffer the
// encoder consumes.
//
// Steps (applied in order):
//   1. Decode and convert to 8-bit RGB
//   2. Resize to size × size
//   3. Optionally flip horizontally (p = 0.5)
//   4. Scale to [0, 1], then normalise with mean 0.5, std 0.5
//      per channel, giving values in [-1, 1]
//   5. Lay out channel-major: [R plane, G plane, B plane]

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use rand::Rng;
use std::path::Path;

pub const CHANNELS: usize = 3;

const MEAN: f32 = 0.5;
const STD:  f32 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct ImageTransform {
    size:            u32,
    horizontal_flip: bool,
}

impl ImageTransform {
    pub fn new(size: usize, horizontal_flip: bool) -> Self {
        Self { size: size as u32, horizontal_flip }
    }

    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Number of floats produced per image.
    pub fn pixels_per_image(&self) -> usize {
        CHANNELS * self.size() * self.size()
    }

    pub fn load(&self, path: &Path) -> Result<Vec<f32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?
            .resize_exact(self.size, self.size, FilterType::Triangle)
            .to_rgb8();

        let img = if self.horizontal_flip && rand::thread_rng().gen_bool(0.5) {
            image::imageops::flip_horizontal(&img)
        } else {
            img
        };

        Ok(self.to_chw(&img))
    }

    fn to_chw(&self, img: &RgbImage) -> Vec<f32> {
        let plane   = self.size() * self.size();
        let mut out = vec![0.0f32; self.pixels_per_image()];

        for (i, pixel) in img.pixels().enumerate() {
            for c in 0..CHANNELS {
                let scaled = pixel[c] as f32 / 255.0;
                out[c * plane + i] = (scaled - MEAN) / STD;
            }
        }
        out
    }
}
