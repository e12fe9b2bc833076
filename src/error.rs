use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the evaluation pipeline.
///
/// Every variant aborts the evaluation of the current sample. None of them are
/// retried: the dataset and configuration errors are not transient, and an
/// accelerator queue is not safe to re-run without building a new session.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),

    #[error("unsupported device: {0} has no precision mapping")]
    UnsupportedDevice(String),

    #[error("unsupported topology: expected exactly 1 input and at least 1 output, found {inputs} input(s) and {outputs} output(s)")]
    UnsupportedTopology { inputs: usize, outputs: usize },

    #[error("failed to load model artifact {path:?}: {reason}")]
    ArtifactLoadError { path: PathBuf, reason: String },

    #[error("input binding failed: {0}")]
    InputBindingError(String),

    #[error("inference execution failed: {0}")]
    InferenceExecutionError(String),

    #[error("prediction and ground truth differ in length: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("result sink failed: {0}")]
    Sink(String),
}

impl EvalError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArtifactLoadError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
