//! Held-out evaluation of a segmentation model.
//!
//! Runs the model over a dataset without gradients and reports the mean
//! composite loss, pixel accuracy and per-class intersection over union.

use burn::prelude::*;
use seg_core::{Error, Result};
use seg_dataset::{SegmentationDataset, SegmentationLoader};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loss::{segmentation_loss, SegmentationLossConfig};
use crate::model::SegmentationModel;

/// Pixel confusion counts, indexed `[label][prediction]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    /// Add paired predictions and labels. Pairs outside the class range are ignored.
    pub fn update(&mut self, predictions: &[i64], labels: &[i64]) {
        let n = self.num_classes() as i64;
        for (&pred, &label) in predictions.iter().zip(labels) {
            if (0..n).contains(&pred) && (0..n).contains(&label) {
                self.counts[label as usize][pred as usize] += 1;
            }
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|c| self.counts[c][c]).sum()
    }

    /// Pixel accuracy in percent
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            100.0 * self.correct() as f64 / total as f64
        }
    }

    /// `TP / (TP + FP + FN)` for one class; `None` when the class appears
    /// in neither predictions nor labels.
    pub fn iou(&self, class: usize) -> Option<f64> {
        let tp = self.counts[class][class];
        let fn_: usize = self.counts[class].iter().sum::<usize>() - tp;
        let fp: usize = (0..self.num_classes())
            .filter(|&i| i != class)
            .map(|i| self.counts[i][class])
            .sum();

        let union = tp + fp + fn_;
        (union > 0).then(|| tp as f64 / union as f64)
    }

    /// Mean IoU over the classes that occur
    pub fn mean_iou(&self) -> f64 {
        let ious: Vec<f64> = (0..self.num_classes()).filter_map(|c| self.iou(c)).collect();
        if ious.is_empty() {
            0.0
        } else {
            ious.iter().sum::<f64>() / ious.len() as f64
        }
    }
}

/// Result of evaluating a model on a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Composite loss averaged over samples
    pub loss: f64,
    /// Pixel accuracy in percent
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub num_batches: usize,
    pub num_samples: usize,
}

impl EvaluationResult {
    pub fn class_iou(&self) -> Vec<Option<f64>> {
        (0..self.confusion.num_classes())
            .map(|c| self.confusion.iou(c))
            .collect()
    }

    pub fn mean_iou(&self) -> f64 {
        self.confusion.mean_iou()
    }
}

/// Evaluate `model` over `dataset` in dataset order.
///
/// Pass an inference model (`AutodiffModule::valid`) so no graph is built.
pub fn evaluate<B: Backend, M: SegmentationModel<B>>(
    model: &M,
    dataset: &SegmentationDataset,
    batch_size: usize,
    device: &B::Device,
    loss_config: &SegmentationLossConfig,
) -> Result<EvaluationResult> {
    let mut confusion = ConfusionMatrix::new(model.num_classes());
    let mut loss_sum = 0.0f64;
    let mut num_batches = 0usize;
    let mut num_samples = 0usize;

    for batch in SegmentationLoader::<B>::sequential(dataset, batch_size, device) {
        let items = batch.images.dims()[0];
        let logits = model.forward(batch.images);

        // Batch losses are means over the batch; weight by its item count.
        let loss = segmentation_loss(logits.clone(), batch.masks.clone(), loss_config);
        let loss_value: f64 = loss.into_scalar().elem();
        loss_sum += loss_value * items as f64;
        num_samples += items;

        let predictions = tensor_to_vec(logits.argmax(1))?;
        let labels = tensor_to_vec(batch.masks)?;
        confusion.update(&predictions, &labels);

        num_batches += 1;
    }

    let result = EvaluationResult {
        loss: if num_samples == 0 {
            0.0
        } else {
            loss_sum / num_samples as f64
        },
        accuracy: confusion.accuracy(),
        confusion,
        num_batches,
        num_samples,
    };

    debug!(
        "Evaluated {} batches: loss={:.4}, accuracy={:.4}%, mIoU={:.4}",
        result.num_batches,
        result.loss,
        result.accuracy,
        result.mean_iou()
    );

    Ok(result)
}

fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 4, Int>) -> Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| Error::Training(format!("Failed to read tensor data: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNetConfig;
    use burn::backend::NdArray;
    use seg_core::ImageDimensions;
    use seg_dataset::SyntheticShapes;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_confusion_matrix_accuracy() {
        let mut matrix = ConfusionMatrix::new(3);
        matrix.update(&[0, 1, 2, 0, 1, 2], &[0, 1, 2, 1, 1, 0]);

        assert_eq!(matrix.total(), 6);
        assert_eq!(matrix.correct(), 4);
        assert!((matrix.accuracy() - 400.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_iou_per_class() {
        let mut matrix = ConfusionMatrix::new(3);
        // class 0: tp 1, fn 1 (label 0 predicted 2), fp 1 (label 1 predicted 0)
        matrix.update(&[0, 2, 0, 1], &[0, 0, 1, 1]);

        assert_eq!(matrix.iou(0), Some(1.0 / 3.0));
        assert_eq!(matrix.iou(1), Some(0.5));
        assert_eq!(matrix.iou(2), Some(0.0));
    }

    #[test]
    fn test_absent_class_is_skipped_in_mean_iou() {
        let mut matrix = ConfusionMatrix::new(3);
        matrix.update(&[0, 0, 1], &[0, 0, 1]);

        assert_eq!(matrix.iou(2), None);
        assert_eq!(matrix.mean_iou(), 1.0);
    }

    #[test]
    fn test_out_of_range_pairs_are_ignored() {
        let mut matrix = ConfusionMatrix::new(2);
        matrix.update(&[0, 5, -1], &[0, 1, 1]);
        assert_eq!(matrix.total(), 1);
    }

    #[test]
    fn test_evaluate_counts_every_pixel() {
        let device = Default::default();
        let dims = ImageDimensions::rgb(16, 16);
        let items = SyntheticShapes::new(dims, 1).generate(5, 3).unwrap();
        let dataset = SegmentationDataset::new(items);
        let model = UNetConfig::new()
            .with_base_filters(2)
            .init::<TestBackend>(&device);

        let result = evaluate(
            &model,
            &dataset,
            2,
            &device,
            &SegmentationLossConfig::default(),
        )
        .unwrap();

        assert_eq!(result.num_batches, 3);
        assert_eq!(result.num_samples, 5);
        assert_eq!(result.confusion.total(), 5 * 16 * 16);
        assert!(result.loss.is_finite() && result.loss > 0.0);
        assert!((0.0..=100.0).contains(&result.accuracy));
        assert_eq!(result.class_iou().len(), 3);
    }

    #[test]
    fn test_loss_does_not_depend_on_batch_size() {
        let device = Default::default();
        let dims = ImageDimensions::rgb(16, 16);
        let items = SyntheticShapes::new(dims, 3).generate(3, 3).unwrap();
        let dataset = SegmentationDataset::new(items);
        let model = UNetConfig::new()
            .with_base_filters(2)
            .init::<TestBackend>(&device);
        let loss_config = SegmentationLossConfig::default();

        // Sizes 2 and 3 give a short last batch and a single full batch.
        let losses: Vec<f64> = [1, 2, 3]
            .iter()
            .map(|&size| {
                evaluate(&model, &dataset, size, &device, &loss_config)
                    .unwrap()
                    .loss
            })
            .collect();

        for loss in &losses[1..] {
            assert!((loss - losses[0]).abs() < 1e-5, "{:?}", losses);
        }
    }

    #[test]
    fn test_evaluate_empty_dataset() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_base_filters(2)
            .init::<TestBackend>(&device);

        let result = evaluate(
            &model,
            &SegmentationDataset::default(),
            4,
            &device,
            &SegmentationLossConfig::default(),
        )
        .unwrap();

        assert_eq!(result.num_batches, 0);
        assert_eq!(result.loss, 0.0);
        assert_eq!(result.accuracy, 0.0);
    }
}
