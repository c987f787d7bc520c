use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NerError {
    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("incompatible model bundle: {0}")]
    Incompatible(String),

    #[error("vocabulary error: {0}")]
    Vocabulary(String),

    #[error("label set error: {0}")]
    Labels(String),

    #[error("segmentation failed: {0}")]
    Segmentation(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("model bundle is not available: {0}")]
    NotLoaded(String),

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NerError {
    pub fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Collapses any failure raised while running the models into a single
    /// inference error. Errors that already are inference errors pass through.
    pub fn into_inference(self) -> Self {
        match self {
            Self::Inference(_) => self,
            other => Self::Inference(other.to_string()),
        }
    }

    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Load { .. } | Self::DimensionMismatch { .. } | Self::Incompatible(_)
        )
    }
}
