//! Core types and utilities for U-Net segmentation training.
//!
//! This crate provides the error type, configuration, metrics bookkeeping
//! and backend selection shared by the dataset and training crates.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use backend::*;
pub use config::*;
pub use error::{Error, Result};
pub use metrics::{EpochRecord, MetricsAccumulator, TrainingHistory};
pub use types::*;
