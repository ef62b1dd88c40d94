//! Error types for the libreco-core crate.
//!
//! Every failure in this crate is a caller contract violation detected while a
//! model is being assembled: an inconsistent catalog, a batch whose width does
//! not match the catalog, or an out-of-range index. None of them are retried.

use thiserror::Error;

/// The main error type for libreco-core operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoError {
    /// The feature catalog or a requested option is inconsistent.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// A description of the configuration error.
        message: String,
    },

    /// A batch does not have the shape declared by the catalog.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The shape that was provided.
        actual: Vec<usize>,
    },

    /// An index does not address any row of its table.
    #[error("Index {index} out of range for {what} with {size} entries")]
    IndexOutOfRange {
        /// What was indexed (a field name, a table name).
        what: String,
        /// The offending index.
        index: usize,
        /// Number of addressable entries.
        size: usize,
    },
}

impl RecoError {
    /// Shorthand for [`RecoError::ConfigError`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

/// A specialized Result type for libreco-core operations.
pub type Result<T> = std::result::Result<T, RecoError>;
