//! Error types shared by the segmentation training crates.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for segmentation training.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image could not be decoded or converted
    #[error("Image processing error: {0}")]
    Image(String),

    /// Dataset construction or sample validation failed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Training loop error
    #[error("Training error: {0}")]
    Training(String),

    /// Model weights could not be written or read
    #[error("Checkpoint error at '{path}': {message}")]
    Checkpoint { path: PathBuf, message: String },

    /// JSON or TOML (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn checkpoint(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Checkpoint {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

/// Specialized Result type for segmentation training.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Dataset("mask value 7 out of range".to_string());
        assert_eq!(err.to_string(), "Dataset error: mask value 7 out of range");
    }

    #[test]
    fn test_checkpoint_error_names_path() {
        let err = Error::checkpoint("runs/checkpoint.mpk", "disk full");
        let message = err.to_string();
        assert!(message.contains("runs/checkpoint.mpk"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
