//! Configuration structures for segmentation training.
//!
//! Every struct carries `#[serde(default)]`, so a TOML file only needs the
//! fields it wants to change.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::ImageDimensions;
use crate::{Error, Result};

/// Number of 2x down-sampling stages in the U-Net encoder.
pub const UNET_DEPTH: u32 = 3;

/// Classes painted by the synthetic generator: background, rectangle, disc.
pub const SYNTHETIC_CLASSES: usize = 3;

/// Main configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Where model weights are written at the end of training
    pub checkpoint_path: PathBuf,
    /// Random seed for data generation, splitting and shuffling
    pub seed: u64,
    /// Model configuration
    pub model: ModelConfig,
    /// Optimization hyperparameters
    pub optim: OptimConfig,
    /// Data configuration
    pub data: DataConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("checkpoint.pth"),
            seed: 42,
            model: ModelConfig::default(),
            optim: OptimConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Reject configurations the training loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.model.num_classes < 2 {
            return Err(Error::Config(format!(
                "num_classes must be at least 2, got {}",
                self.model.num_classes
            )));
        }
        if self.model.base_filters == 0 {
            return Err(Error::Config("base_filters must be greater than 0".into()));
        }
        if self.optim.num_epochs == 0 {
            return Err(Error::Config("num_epochs must be greater than 0".into()));
        }
        if self.optim.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than 0".into()));
        }
        if !(self.optim.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.optim.learning_rate
            )));
        }
        if !(self.optim.adam_epsilon > 0.0) {
            return Err(Error::Config(format!(
                "adam_epsilon must be positive, got {}",
                self.optim.adam_epsilon
            )));
        }
        if self.optim.log_every == 0 {
            return Err(Error::Config("log_every must be greater than 0".into()));
        }
        if !(0.0..=1.0).contains(&self.optim.bce_weight) {
            return Err(Error::Config(format!(
                "bce_weight must lie in [0, 1], got {}",
                self.optim.bce_weight
            )));
        }
        if self.optim.dice_smooth < 0.0 {
            return Err(Error::Config("dice_smooth must not be negative".into()));
        }
        self.optim.lr_schedule.validate()?;
        self.data.validate()?;
        if self.data.image_size.channels != self.model.in_channels {
            return Err(Error::Config(format!(
                "image channels ({}) do not match model input channels ({})",
                self.data.image_size.channels, self.model.in_channels
            )));
        }
        if matches!(self.data.source, DataSource::Synthetic { .. })
            && self.model.num_classes < SYNTHETIC_CLASSES
        {
            return Err(Error::Config(format!(
                "synthetic data has {} classes, but num_classes is {}",
                SYNTHETIC_CLASSES, self.model.num_classes
            )));
        }
        Ok(())
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of input channels (3 for RGB)
    pub in_channels: usize,
    /// Number of segmentation classes, background included
    pub num_classes: usize,
    /// Filters in the first encoder level; doubled at every level
    pub base_filters: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            num_classes: 3,
            base_filters: 16,
        }
    }
}

/// Optimization hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptimConfig {
    /// Number of training epochs
    pub num_epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Initial Adam learning rate
    pub learning_rate: f64,
    /// Adam epsilon
    pub adam_epsilon: f64,
    /// Learning rate schedule, stepped once per epoch
    pub lr_schedule: LrScheduleConfig,
    /// Log running averages every this many steps
    pub log_every: usize,
    /// Weight of the BCE term; the Dice term gets `1 - bce_weight`
    pub bce_weight: f64,
    /// Smoothing constant of the Dice coefficient
    pub dice_smooth: f64,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            num_epochs: 1,
            batch_size: 4,
            learning_rate: 1e-4,
            adam_epsilon: 1e-8,
            lr_schedule: LrScheduleConfig::default(),
            log_every: 30,
            bce_weight: 0.5,
            dice_smooth: 1.0,
        }
    }
}

/// Learning rate schedule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LrScheduleConfig {
    /// Schedule type
    pub schedule_type: LrScheduleType,
    /// Epochs between two decays
    pub step_size: usize,
    /// Decay factor
    pub gamma: f64,
}

impl Default for LrScheduleConfig {
    fn default() -> Self {
        Self {
            schedule_type: LrScheduleType::StepLR,
            step_size: 8,
            gamma: 0.1,
        }
    }
}

impl LrScheduleConfig {
    fn validate(&self) -> Result<()> {
        if self.schedule_type == LrScheduleType::StepLR {
            if self.step_size == 0 {
                return Err(Error::Config("lr_schedule.step_size must be greater than 0".into()));
            }
            if !(self.gamma > 0.0) {
                return Err(Error::Config(format!(
                    "lr_schedule.gamma must be positive, got {}",
                    self.gamma
                )));
            }
        }
        Ok(())
    }
}

/// Learning rate schedule type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LrScheduleType {
    /// Keep the initial rate
    Constant,
    /// Step decay
    #[serde(rename = "step_lr")]
    StepLR,
}

/// Where training samples come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// Procedurally generated shapes, no files needed
    Synthetic { num_samples: usize },
    /// `root/images/*` paired with `root/masks/*` by file name
    Folder { root: PathBuf },
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Synthetic { num_samples: 240 }
    }
}

/// Data configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Sample source
    pub source: DataSource,
    /// Size images and masks are resized to
    pub image_size: ImageDimensions,
    /// Fraction of samples held out for evaluation
    pub test_fraction: f64,
    /// Reshuffle the training split every epoch
    pub shuffle: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            image_size: ImageDimensions::default(),
            test_fraction: 0.2,
            shuffle: true,
        }
    }
}

impl DataConfig {
    fn validate(&self) -> Result<()> {
        if !self.image_size.divisible_by_pow2(UNET_DEPTH) {
            return Err(Error::Config(format!(
                "image size {}x{} must be a non-zero multiple of {}",
                self.image_size.height,
                self.image_size.width,
                1usize << UNET_DEPTH
            )));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(Error::Config(format!(
                "test_fraction must lie in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if let DataSource::Synthetic { num_samples: 0 } = self.source {
            return Err(Error::Config("synthetic num_samples must be greater than 0".into()));
        }
        Ok(())
    }
}
