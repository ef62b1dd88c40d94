//! Error types for the libreco-models crate.

use std::path::PathBuf;

use libreco_core::RecoError;
use libreco_layers::LayerError;
use thiserror::Error;

/// Error type for model assembly, inference and recommendation.
///
/// Errors raised by the core and layer crates are folded into the matching
/// variant here, so callers only match on one enum.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Inconsistent catalog, hyperparameters or batch composition.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// A description of the configuration error.
        message: String,
    },

    /// A batch or tensor does not have the expected shape.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The shape that was provided.
        actual: Vec<usize>,
    },

    /// An index does not address any row.
    #[error("Index {index} out of range for {what} with {size} entries")]
    IndexOutOfRange {
        /// What was indexed.
        what: String,
        /// The offending index.
        index: usize,
        /// Number of addressable entries.
        size: usize,
    },

    /// Recommendation was requested before embeddings were materialized.
    #[error("Embeddings have not been set, call set_embeddings first")]
    EmbeddingsNotSet,

    /// Reading a configuration file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration document could not be parsed.
    #[error("Deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl ModelError {
    /// Shorthand for [`ModelError::ConfigError`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

impl From<RecoError> for ModelError {
    fn from(err: RecoError) -> Self {
        LayerError::from(err).into()
    }
}

impl From<LayerError> for ModelError {
    fn from(err: LayerError) -> Self {
        match err {
            LayerError::ConfigError { message } => ModelError::ConfigError { message },
            LayerError::ShapeMismatch { expected, actual } => {
                ModelError::ShapeMismatch { expected, actual }
            }
            LayerError::InvalidInputDimension { expected, actual } => ModelError::ShapeMismatch {
                expected: vec![expected],
                actual: vec![actual],
            },
            LayerError::IndexOutOfRange { what, index, size } => {
                ModelError::IndexOutOfRange { what, index, size }
            }
        }
    }
}

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_kind() {
        let err: ModelError = RecoError::config("window size must be positive").into();
        assert!(matches!(err, ModelError::ConfigError { .. }));

        let err: ModelError = LayerError::InvalidInputDimension {
            expected: 4,
            actual: 5,
        }
        .into();
        assert_eq!(err.to_string(), "Shape mismatch: expected [4], got [5]");
    }

    #[test]
    fn test_display() {
        assert!(ModelError::EmbeddingsNotSet
            .to_string()
            .contains("set_embeddings"));
        let err = ModelError::IndexOutOfRange {
            what: "user".to_string(),
            index: 9,
            size: 3,
        };
        assert_eq!(err.to_string(), "Index 9 out of range for user with 3 entries");
    }
}
