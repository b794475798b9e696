//! Model checkpointing.
//!
//! Weights are serialized with Burn's `NamedMpkBytesRecorder` at full
//! precision and written to exactly the requested path. A small JSON file
//! next to the weights records the model configuration and the training
//! history so a checkpoint can be rebuilt without the config file used for
//! training.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use burn::tensor::backend::Backend;
use seg_core::{Error, ModelConfig, Result, TrainingHistory};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{UNet, UNetConfig};

type WeightsRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;
type UNetRecord<B> = <UNet<B> as Module<B>>::Record;

/// Path of the metadata file that accompanies the weights at `path`
pub fn metadata_file(path: &Path) -> PathBuf {
    path.with_extension("json")
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Save model weights to `path`, creating parent directories as needed.
///
/// Returns the path of the written file.
pub fn save_checkpoint<B: Backend>(model: &UNet<B>, path: &Path) -> Result<PathBuf> {
    create_parent(path)?;

    let record = model.clone().into_record();
    let bytes = Recorder::<B>::record(&WeightsRecorder::default(), record, ())
        .map_err(|e| Error::checkpoint(path, format!("{:?}", e)))?;
    fs::write(path, bytes).map_err(|e| Error::checkpoint(path, e.to_string()))?;

    info!("Checkpoint saved to {:?}", path);
    Ok(path.to_path_buf())
}

/// Build a model from `config` and load the weights stored at `path`.
pub fn load_checkpoint<B: Backend>(
    config: &UNetConfig,
    path: &Path,
    device: &B::Device,
) -> Result<UNet<B>> {
    if !path.is_file() {
        return Err(Error::checkpoint(path, "file not found"));
    }

    let bytes = fs::read(path).map_err(|e| Error::checkpoint(path, e.to_string()))?;
    let record: UNetRecord<B> =
        Recorder::<B>::load(&WeightsRecorder::default(), bytes, device)
            .map_err(|e| Error::checkpoint(path, format!("{:?}", e)))?;
    let model = config.init::<B>(device).load_record(record);

    info!("Checkpoint loaded from {:?}", path);
    Ok(model)
}

/// Description of a saved checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMetadata {
    pub model: ModelConfig,
    pub history: TrainingHistory,
    pub backend: String,
}

impl CheckpointMetadata {
    pub fn new(model: ModelConfig, history: TrainingHistory) -> Self {
        Self {
            model,
            history,
            backend: seg_core::backend_name().to_string(),
        }
    }

    /// Save next to the weights at `path`
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let file = metadata_file(path);
        create_parent(&file)?;

        let json = serde_json::to_string_pretty(self)?;
        fs::write(&file, json)?;
        Ok(file)
    }

    /// Load the metadata stored next to the weights at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let file = metadata_file(path);
        let json = fs::read_to_string(&file)
            .map_err(|e| Error::checkpoint(&file, e.to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Load a checkpoint using the model configuration stored in its metadata.
pub fn load_with_metadata<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(UNet<B>, CheckpointMetadata)> {
    let metadata = CheckpointMetadata::load(path)?;
    let model = load_checkpoint(&UNetConfig::from(&metadata.model), path, device)?;
    Ok((model, metadata))
}
