//! Error handling for the car price predictor
//!
//! One error enum covers startup (artifact loading, schema validation,
//! configuration) and per-request failures. HTTP status mapping lives in
//! `api_errors`.

use thiserror::Error;

/// Main error type for the prediction core
#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("Artifact missing: {artifact} not found at {path}")]
    ArtifactMissing { artifact: String, path: String },

    #[error("Artifact corrupt: {artifact} - {message}")]
    ArtifactCorrupt { artifact: String, message: String },

    #[error("Trained feature '{column}' has no entry in the alias table")]
    UnmappedFeature { column: String },

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("No request field matched any trained feature (expected one of: {expected})")]
    NoMatchingFeatures { expected: String },

    #[error("Prediction failed: {message}")]
    PredictionFailed { message: String },

    #[error("Model info not available")]
    ModelInfoUnavailable,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid training data: {message}")]
    InvalidDataset { message: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

/// Shorthand for results carrying a `PredictorError`
pub type PredictorResult<T> = Result<T, PredictorError>;

impl PredictorError {
    /// Create an artifact-missing error
    pub fn artifact_missing(artifact: impl Into<String>, path: impl Into<String>) -> Self {
        Self::ArtifactMissing {
            artifact: artifact.into(),
            path: path.into(),
        }
    }

    /// Create an artifact-corrupt error
    pub fn artifact_corrupt(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArtifactCorrupt {
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    pub fn unmapped_feature(column: impl Into<String>) -> Self {
        Self::UnmappedFeature {
            column: column.into(),
        }
    }

    pub fn no_matching_features<S: AsRef<str>>(expected: &[S]) -> Self {
        Self::NoMatchingFeatures {
            expected: expected
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create a prediction failure wrapping a transform or inference error
    pub fn prediction_failed(message: impl Into<String>) -> Self {
        Self::PredictionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_dataset(message: impl Into<String>) -> Self {
        Self::InvalidDataset {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// True for failures caused by the client's input rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictorError::NoMatchingFeatures { .. })
    }
}

impl From<figment::Error> for PredictorError {
    fn from(err: figment::Error) -> Self {
        PredictorError::config(err.to_string())
    }
}

impl From<csv::Error> for PredictorError {
    fn from(err: csv::Error) -> Self {
        PredictorError::invalid_dataset(err.to_string())
    }
}
