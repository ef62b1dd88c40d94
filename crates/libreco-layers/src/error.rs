//! Error types for the libreco-layers crate.

use libreco_core::RecoError;
use thiserror::Error;

/// Error type for layer operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayerError {
    /// Shape mismatch between expected and actual tensor shapes.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape
        expected: Vec<usize>,
        /// The actual shape that was provided
        actual: Vec<usize>,
    },

    /// Invalid input dimension for the layer.
    #[error("Invalid input dimension: expected {expected}, got {actual}")]
    InvalidInputDimension {
        /// The expected input dimension
        expected: usize,
        /// The actual input dimension
        actual: usize,
    },

    /// An index does not address any row of a table.
    #[error("Index {index} out of range for {what} with {size} rows")]
    IndexOutOfRange {
        /// The indexed table or tensor
        what: String,
        /// The offending index
        index: usize,
        /// Number of addressable rows
        size: usize,
    },

    /// Configuration error for the layer.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

impl LayerError {
    /// Shorthand for [`LayerError::ConfigError`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

impl From<RecoError> for LayerError {
    fn from(err: RecoError) -> Self {
        match err {
            RecoError::ConfigError { message } => LayerError::ConfigError { message },
            RecoError::ShapeMismatch { expected, actual } => {
                LayerError::ShapeMismatch { expected, actual }
            }
            RecoError::IndexOutOfRange { what, index, size } => {
                LayerError::IndexOutOfRange { what, index, size }
            }
        }
    }
}

/// Result type alias for layer operations.
pub type LayerResult<T> = Result<T, LayerError>;
