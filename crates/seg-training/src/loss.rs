//! Composite segmentation loss: binary cross-entropy on logits blended with
//! a soft Dice term, both computed against a one-hot target.

use burn::tensor::{activation::sigmoid, backend::Backend, Int, Tensor};
use seg_core::OptimConfig;

/// Weights of the composite loss
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationLossConfig {
    /// Weight of the BCE term; Dice gets `1 - bce_weight`
    pub bce_weight: f64,
    /// Added to both sides of the Dice ratio so empty masks stay finite
    pub smooth: f64,
}

impl Default for SegmentationLossConfig {
    fn default() -> Self {
        Self {
            bce_weight: 0.5,
            smooth: 1.0,
        }
    }
}

impl From<&OptimConfig> for SegmentationLossConfig {
    fn from(config: &OptimConfig) -> Self {
        Self {
            bce_weight: config.bce_weight,
            smooth: config.dice_smooth,
        }
    }
}

/// Expand a [B, 1, H, W] label map into a [B, num_classes, H, W] float
/// target with a 1.0 in the channel of each pixel's class.
pub fn one_hot<B: Backend>(labels: Tensor<B, 4, Int>, num_classes: usize) -> Tensor<B, 4> {
    let channels = (0..num_classes)
        .map(|class| labels.clone().equal_elem(class as i64).float())
        .collect();
    Tensor::cat(channels, 1)
}

/// Mean binary cross-entropy between `sigmoid(logits)` and `target`,
/// in the overflow-free form `max(x, 0) - x * t + ln(1 + e^-|x|)`.
pub fn bce_with_logits<B: Backend>(logits: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    let positive = logits.clone().clamp_min(0.0);
    let log_term = logits.clone().abs().neg().exp().log1p();
    (positive - logits * target + log_term).mean()
}

/// Soft Dice loss, `1 - (2I + smooth) / (U + smooth)` per batch item and
/// channel with sums over the spatial dimensions, averaged.
pub fn dice_loss<B: Backend>(
    logits: Tensor<B, 4>,
    target: Tensor<B, 4>,
    smooth: f64,
) -> Tensor<B, 1> {
    let probabilities = sigmoid(logits);

    let intersection = (probabilities.clone() * target.clone()).sum_dim(3).sum_dim(2);
    let union = probabilities.sum_dim(3).sum_dim(2) + target.sum_dim(3).sum_dim(2);
    let coefficient = intersection
        .mul_scalar(2.0)
        .add_scalar(smooth)
        .div(union.add_scalar(smooth));

    coefficient.neg().add_scalar(1.0).mean()
}

/// `bce * w + dice * (1 - w)` for logits [B, C, H, W] and labels [B, 1, H, W].
/// The class count is taken from the logits.
pub fn segmentation_loss<B: Backend>(
    logits: Tensor<B, 4>,
    labels: Tensor<B, 4, Int>,
    config: &SegmentationLossConfig,
) -> Tensor<B, 1> {
    let [_, num_classes, _, _] = logits.dims();
    let target = one_hot(labels, num_classes);

    let bce = bce_with_logits(logits.clone(), target.clone());
    let dice = dice_loss(logits, target, config.smooth);

    bce.mul_scalar(config.bce_weight) + dice.mul_scalar(1.0 - config.bce_weight)
}
