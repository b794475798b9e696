//! Training infrastructure for U-Net semantic segmentation.
//!
//! This crate provides:
//! - The U-Net model
//! - The BCE + Dice segmentation loss and pixel accuracy
//! - The training step and epoch driver
//! - Held-out evaluation
//! - Step-decay learning rate scheduling
//! - Checkpoint save and load

pub mod accuracy;
pub mod checkpoint;
pub mod evaluator;
pub mod loss;
pub mod lr_schedule;
pub mod model;
pub mod trainer;

pub use accuracy::{correct_pixels, pixel_accuracy};
pub use checkpoint::{
    load_checkpoint, load_with_metadata, metadata_file, save_checkpoint, CheckpointMetadata,
};
pub use evaluator::{evaluate, ConfusionMatrix, EvaluationResult};
pub use loss::{bce_with_logits, dice_loss, one_hot, segmentation_loss, SegmentationLossConfig};
pub use lr_schedule::{LearningRateScheduler, SchedulerType};
pub use model::{SegmentationModel, UNet, UNetConfig};
pub use trainer::{adam_config, run_training, train_step, StepOutput, Trainer, TrainingReport};
