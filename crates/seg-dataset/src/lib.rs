//! Segmentation dataset loading and batching.
//!
//! This crate provides in-memory segmentation datasets built from a
//! synthetic shapes generator or a folder of image/mask pairs, and the
//! batching that turns them into Burn tensors.

pub mod batcher;
pub mod dataset;
pub mod loader;
pub mod statistics;
pub mod synthetic;

pub use batcher::{SegmentationBatch, SegmentationBatcher, SegmentationLoader};
pub use dataset::{create_datasets, SegmentationDataset, SegmentationItem};
pub use loader::SegmentationFolder;
pub use statistics::DatasetStatistics;
pub use synthetic::SyntheticShapes;
