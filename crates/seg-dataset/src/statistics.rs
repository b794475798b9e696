//! Dataset statistics computation.

use crate::dataset::SegmentationItem;

/// Pixel-level class statistics of a set of samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStatistics {
    pub num_samples: usize,
    /// Pixel count per class id
    pub class_pixels: Vec<usize>,
}

impl DatasetStatistics {
    pub fn from_items(items: &[SegmentationItem], num_classes: usize) -> Self {
        let mut class_pixels = vec![0usize; num_classes];
        for item in items {
            for &class in &item.mask {
                if let Some(count) = class_pixels.get_mut(class as usize) {
                    *count += 1;
                }
            }
        }
        Self {
            num_samples: items.len(),
            class_pixels,
        }
    }

    pub fn total_pixels(&self) -> usize {
        self.class_pixels.iter().sum()
    }

    /// Share of pixels per class, summing to 1 for a non-empty set
    pub fn class_fractions(&self) -> Vec<f64> {
        let total = self.total_pixels();
        self.class_pixels
            .iter()
            .map(|&count| {
                if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64
                }
            })
            .collect()
    }
}
