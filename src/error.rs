use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the detection core.
///
/// All of these are deterministic failures of input or environment; none is
/// retried automatically.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A model artifact could not be read or parsed at construction time.
    #[error("failed to load model artifact {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// A frame could not be run through the loaded model, or the backend
    /// session is no longer available.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The run configuration is missing or inconsistent. Raised before any
    /// frame is processed.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl DetectError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
