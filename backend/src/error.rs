use std::path::PathBuf;

use shared::ErrorResponse;

use crate::processing::validator::ValidationFailure;

/// Anything that stops the process from building its diagnosis context.
/// None of these degrade silently; the binary aborts on every variant.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Model loading failed: {0}")]
    ModelLoad(String),
    #[error("Label list has {labels} entries but the classifier produces {outputs} outputs")]
    LabelMismatch { labels: usize, outputs: usize },
    #[error("Configured num_classes is {configured} but the label list has {labels} entries")]
    ClassCountMismatch { configured: usize, labels: usize },
    #[error("Knowledge table error: {0}")]
    Knowledge(String),
    #[error("Model support not compiled in; rebuild with `--features torch`")]
    TorchUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Expected input tensor of shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: Vec<usize>,
    },
    #[error("Classifier returned {actual} outputs, expected {expected}")]
    OutputMismatch { expected: usize, actual: usize },
    #[error("Classifier produced non-finite output")]
    NonFinite,
    #[cfg(feature = "torch")]
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),
    #[error("Model error: {0}")]
    Backend(String),
}

/// Per-request failure. Each is surfaced once; nothing inside the core retries.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosisError {
    #[error("Could not decode image: {0}")]
    Input(#[from] image::ImageError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Internal consistency failure: {0}")]
    Internal(String),
}

impl DiagnosisError {
    /// Caller-facing body. Only validation failures say what went wrong;
    /// everything else is generic and the detail goes to the log.
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            DiagnosisError::Validation(failure) => ErrorResponse::rejected(failure.reason),
            DiagnosisError::Input(_) | DiagnosisError::Inference(_) | DiagnosisError::Internal(_) => {
                ErrorResponse::new("Error analyzing image")
            }
        }
    }
}
