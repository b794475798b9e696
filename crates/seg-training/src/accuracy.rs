//! Pixel accuracy of per-pixel class predictions.

use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};

/// Number of pixels whose arg-max class equals the label, and the number of
/// pixels compared.
pub fn correct_pixels<B: Backend>(
    logits: Tensor<B, 4>,
    labels: Tensor<B, 4, Int>,
) -> (usize, usize) {
    let [batch, _, height, width] = logits.dims();
    let predictions = logits.argmax(1).reshape([batch, height, width]);
    let labels = labels.reshape([batch, height, width]);

    let correct: i64 = predictions
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem();

    (correct as usize, batch * height * width)
}

/// Percentage of pixels predicted correctly, in [0, 100]
pub fn pixel_accuracy<B: Backend>(logits: Tensor<B, 4>, labels: Tensor<B, 4, Int>) -> f64 {
    let (correct, total) = correct_pixels(logits, labels);
    if total == 0 {
        0.0
    } else {
        100.0 * correct as f64 / total as f64
    }
}
