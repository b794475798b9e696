//! Burn batching for segmentation samples.
//!
//! `SegmentationBatcher` turns items into tensors; `SegmentationLoader`
//! walks a dataset in (optionally shuffled) batches and is rebuilt every
//! epoch.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::dataset::{SegmentationDataset, SegmentationItem};

/// A batch of images and masks
#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    /// Images with shape [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,
    /// Class ids with shape [batch_size, 1, height, width]
    pub masks: Tensor<B, 4, Int>,
}

/// Batcher for segmentation items. All items of a batch must share the
/// same dimensions.
#[derive(Clone, Debug, Default)]
pub struct SegmentationBatcher;

impl<B: Backend> Batcher<B, SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher {
    fn batch(&self, items: Vec<SegmentationItem>, device: &B::Device) -> SegmentationBatch<B> {
        let batch_size = items.len();
        let dims = items
            .first()
            .map(|item| item.dims)
            .unwrap_or_default();

        let images_data: Vec<f32> = items
            .iter()
            .flat_map(|item| item.image.iter().copied())
            .collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(
                images_data,
                [batch_size, dims.channels, dims.height, dims.width],
            ),
            device,
        );

        let masks_data: Vec<i64> = items
            .iter()
            .flat_map(|item| item.mask.iter().map(|&v| v as i64))
            .collect();
        let masks = Tensor::<B, 4, Int>::from_data(
            TensorData::new(masks_data, [batch_size, 1, dims.height, dims.width]),
            device,
        );

        SegmentationBatch { images, masks }
    }
}

/// One pass over a dataset in batches of `batch_size`; the last batch may
/// be smaller.
pub struct SegmentationLoader<'a, B: Backend> {
    dataset: &'a SegmentationDataset,
    batcher: SegmentationBatcher,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
    device: B::Device,
}

impl<'a, B: Backend> SegmentationLoader<'a, B> {
    /// Visit samples in dataset order
    pub fn sequential(
        dataset: &'a SegmentationDataset,
        batch_size: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            dataset,
            batcher: SegmentationBatcher,
            order: (0..dataset.len()).collect(),
            batch_size: batch_size.max(1),
            cursor: 0,
            device: device.clone(),
        }
    }

    /// Visit samples in an order drawn from `rng`
    pub fn shuffled(
        dataset: &'a SegmentationDataset,
        batch_size: usize,
        device: &B::Device,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut loader = Self::sequential(dataset, batch_size, device);
        loader.order.shuffle(rng);
        loader
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }
}

impl<B: Backend> Iterator for SegmentationLoader<'_, B> {
    type Item = SegmentationBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let items: Vec<SegmentationItem> = self.order[self.cursor..end]
            .iter()
            .filter_map(|&i| self.dataset.get(i))
            .collect();
        self.cursor = end;

        Some(<SegmentationBatcher as Batcher<B, _, _>>::batch(
            &self.batcher,
            items,
            &self.device,
        ))
    }
}
