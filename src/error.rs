use std::path::PathBuf;

use thiserror::Error;

/// Failure to bring up the detection model. Fatal for the session.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model weights not found at {}", .0.display())]
    MissingWeights(PathBuf),
    #[error("invalid model weights at {}: {reason}", .path.display())]
    InvalidWeights { path: PathBuf, reason: String },
    #[error("detector backend '{0}' is not compiled into this build")]
    BackendUnavailable(String),
    #[error("model class '{0}' is not a fire/smoke label")]
    UnknownClass(String),
}

/// Rejected image upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Upload an image first.")]
    Empty,
    #[error("Image is larger than the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("Could not decode image: {0}")]
    Decode(String),
}
