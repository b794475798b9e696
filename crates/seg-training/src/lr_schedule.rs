//! Epoch-level learning rate scheduling.

use seg_core::{LrScheduleConfig, LrScheduleType};
use serde::{Deserialize, Serialize};

/// Learning rate scheduler type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum SchedulerType {
    /// Constant learning rate (no scheduling)
    #[default]
    Constant,

    /// Step decay: multiply LR by gamma every step_size epochs
    StepLR { step_size: usize, gamma: f64 },
}

impl From<&LrScheduleConfig> for SchedulerType {
    fn from(config: &LrScheduleConfig) -> Self {
        match config.schedule_type {
            LrScheduleType::Constant => SchedulerType::Constant,
            LrScheduleType::StepLR => SchedulerType::StepLR {
                step_size: config.step_size,
                gamma: config.gamma,
            },
        }
    }
}

/// Learning rate scheduler
#[derive(Debug, Clone)]
pub struct LearningRateScheduler {
    scheduler_type: SchedulerType,
    current_lr: f64,
    current_epoch: usize,
}

impl LearningRateScheduler {
    pub fn new(scheduler_type: SchedulerType, base_lr: f64) -> Self {
        Self {
            scheduler_type,
            current_lr: base_lr,
            current_epoch: 0,
        }
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Step the scheduler (call at the end of each epoch)
    pub fn step(&mut self) {
        self.current_epoch += 1;

        match self.scheduler_type {
            SchedulerType::Constant => {}
            SchedulerType::StepLR { step_size, gamma } => {
                if step_size > 0 && self.current_epoch % step_size == 0 {
                    self.current_lr *= gamma;
                }
            }
        }
    }

    /// Number of completed `step` calls
    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }
}
