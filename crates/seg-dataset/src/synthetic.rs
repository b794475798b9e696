//! Procedural shapes dataset.
//!
//! Each image shows a noisy background (class 0), one filled rectangle
//! (class 1) and one filled disc (class 2). The disc is drawn last and
//! covers the rectangle where they overlap.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use seg_core::{ImageDimensions, Result};
use tracing::debug;

use crate::dataset::SegmentationItem;

pub const BACKGROUND: u8 = 0;
pub const RECTANGLE: u8 = 1;
pub const DISC: u8 = 2;

/// Seeded generator of shape images
#[derive(Debug, Clone)]
pub struct SyntheticShapes {
    dims: ImageDimensions,
    seed: u64,
    noise: f32,
}

impl SyntheticShapes {
    pub fn new(dims: ImageDimensions, seed: u64) -> Self {
        Self {
            dims,
            seed,
            noise: 0.05,
        }
    }

    /// Amplitude of the uniform pixel noise
    pub fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise;
        self
    }

    /// Generate `count` samples. The same seed always yields the same items.
    pub fn generate(&self, count: usize, num_classes: usize) -> Result<Vec<SegmentationItem>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let items = (0..count)
            .map(|index| self.sample(&mut rng, index, num_classes))
            .collect::<Result<Vec<_>>>()?;
        debug!("Generated {} synthetic samples of {}", items.len(), self.dims);
        Ok(items)
    }

    fn sample(
        &self,
        rng: &mut ChaCha8Rng,
        index: usize,
        num_classes: usize,
    ) -> Result<SegmentationItem> {
        let (h, w) = (self.dims.height, self.dims.width);
        let mut mask = vec![BACKGROUND; h * w];

        // Rectangle between an eighth and a half of each side.
        let rect_h = rng.gen_range((h / 8).max(1)..=(h / 2).max(1));
        let rect_w = rng.gen_range((w / 8).max(1)..=(w / 2).max(1));
        let top = rng.gen_range(0..=h - rect_h);
        let left = rng.gen_range(0..=w - rect_w);
        for y in top..top + rect_h {
            for x in left..left + rect_w {
                mask[y * w + x] = RECTANGLE;
            }
        }

        // The center pixel is always inside the disc.
        let max_radius = (h.min(w) / 4).max(1);
        let radius = rng.gen_range(1..=max_radius) as f32;
        let cy = rng.gen_range(0..h) as f32;
        let cx = rng.gen_range(0..w) as f32;
        for y in 0..h {
            for x in 0..w {
                let (dy, dx) = (y as f32 - cy, x as f32 - cx);
                if dy * dy + dx * dx <= radius * radius {
                    mask[y * w + x] = DISC;
                }
            }
        }

        let background: [f32; 3] = [
            rng.gen_range(0.1..0.4),
            rng.gen_range(0.1..0.4),
            rng.gen_range(0.1..0.4),
        ];
        let palette = [background, [0.9, 0.25, 0.2], [0.2, 0.35, 0.9]];

        let plane = h * w;
        let mut image = vec![0.0f32; self.dims.len()];
        for c in 0..self.dims.channels {
            for (p, &class) in mask.iter().enumerate() {
                let base = palette[class as usize][c % 3];
                let jitter = rng.gen_range(-self.noise..=self.noise);
                image[c * plane + p] = (base + jitter).clamp(0.0, 1.0);
            }
        }

        SegmentationItem::new(
            image,
            mask,
            self.dims,
            num_classes,
            format!("synthetic#{index}"),
        )
    }
}
