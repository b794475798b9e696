//! In-memory segmentation dataset and the train/test factory.

use burn::data::dataset::Dataset;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use seg_core::{DataConfig, DataSource, Error, ImageDimensions, Result};
use tracing::info;

use crate::loader::SegmentationFolder;
use crate::synthetic::SyntheticShapes;

/// One image with its per-pixel class mask
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SegmentationItem {
    /// Image data as flattened CHW float array in [0, 1]
    pub image: Vec<f32>,
    /// Row-major class id per pixel [H * W]
    pub mask: Vec<u8>,
    pub dims: ImageDimensions,
    /// Where the sample came from (file path or generator tag)
    pub source: String,
}

impl SegmentationItem {
    /// Build an item, checking buffer sizes and that every mask value is a
    /// valid class index.
    pub fn new(
        image: Vec<f32>,
        mask: Vec<u8>,
        dims: ImageDimensions,
        num_classes: usize,
        source: impl Into<String>,
    ) -> Result<Self> {
        let source = source.into();
        if image.len() != dims.len() {
            return Err(Error::Dataset(format!(
                "{source}: image has {} values, expected {} for {dims}",
                image.len(),
                dims.len()
            )));
        }
        if mask.len() != dims.pixels() {
            return Err(Error::Dataset(format!(
                "{source}: mask has {} values, expected {}",
                mask.len(),
                dims.pixels()
            )));
        }
        if let Some(&bad) = mask.iter().find(|&&v| v as usize >= num_classes) {
            return Err(Error::Dataset(format!(
                "{source}: mask value {bad} is not a class id below {num_classes}"
            )));
        }

        Ok(Self {
            image,
            mask,
            dims,
            source,
        })
    }
}

/// Segmentation samples held in memory
#[derive(Clone, Debug, Default)]
pub struct SegmentationDataset {
    items: Vec<SegmentationItem>,
}

impl SegmentationDataset {
    pub fn new(items: Vec<SegmentationItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[SegmentationItem] {
        &self.items
    }

    /// Shuffle with `seed` and move `test_fraction` of the samples into a
    /// second dataset. The training part always keeps at least one sample.
    pub fn split(mut self, test_fraction: f64, seed: u64) -> (Self, Self) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.items.shuffle(&mut rng);

        let len = self.items.len();
        let test_len = ((len as f64) * test_fraction).round() as usize;
        let test_len = test_len.min(len.saturating_sub(1));
        let test = self.items.split_off(len - test_len);

        (self, Self::new(test))
    }
}

impl Dataset<SegmentationItem> for SegmentationDataset {
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Build the train and test datasets described by `config`.
pub fn create_datasets(
    config: &DataConfig,
    num_classes: usize,
    seed: u64,
) -> Result<(SegmentationDataset, SegmentationDataset)> {
    let items = match &config.source {
        DataSource::Synthetic { num_samples } => {
            SyntheticShapes::new(config.image_size, seed).generate(*num_samples, num_classes)?
        }
        DataSource::Folder { root } => {
            SegmentationFolder::new(root, config.image_size).load_all(num_classes)?
        }
    };

    if items.is_empty() {
        return Err(Error::Dataset("no samples found".to_string()));
    }

    let (train, test) = SegmentationDataset::new(items).split(config.test_fraction, seed);
    info!(
        "Created datasets: {} train / {} test samples of {}",
        train.len(),
        test.len(),
        config.image_size
    );
    Ok((train, test))
}
