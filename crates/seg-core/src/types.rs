//! Core type definitions for segmentation training.

use serde::{Deserialize, Serialize};

/// Spatial size of the images fed to the network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageDimensions {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageDimensions {
    /// RGB image of the given height and width
    pub fn rgb(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            channels: 3,
        }
    }

    /// Number of pixels in one channel
    pub fn pixels(&self) -> usize {
        self.height * self.width
    }

    /// Number of floats in a CHW image
    pub fn len(&self) -> usize {
        self.channels * self.pixels()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both sides survive `levels` halvings without remainder
    pub fn divisible_by_pow2(&self, levels: u32) -> bool {
        let factor = 1usize << levels;
        self.height > 0 && self.width > 0 && self.height % factor == 0 && self.width % factor == 0
    }
}

impl Default for ImageDimensions {
    fn default() -> Self {
        Self::rgb(64, 64)
    }
}

impl std::fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}
