//! Layers for libreco models.
//!
//! This crate provides the numeric building blocks the models are assembled
//! from:
//!
//! - **Tensor**: a small row-major `f32` array
//! - **Embeddings**: row tables with an OOV sentinel row and zero-pinned rows,
//!   and per-field vectors for dense features
//! - **Pooling**: sum / mean / sqrtn combination of multi-valued sparse fields
//! - **Interaction**: the factorization-machine pairwise term and field
//!   concatenation
//! - **Dense, BatchNorm, activations, MLP**: the deep-tower stack
//!
//! # Quick Start
//!
//! ```
//! use libreco_layers::prelude::*;
//!
//! let mlp = MLPConfig::new(32)
//!     .add_layer(16, ActivationType::Elu)
//!     .add_layer(8, ActivationType::Elu)
//!     .with_batch_norm(true)
//!     .build(42)
//!     .unwrap();
//!
//! let fields = Tensor::ones(&[4, 4, 8]);
//! let flat = concat_fields(&fields).unwrap();
//! let user_vectors = mlp.forward(&flat).unwrap();
//! assert_eq!(user_vectors.shape(), &[4, 8]);
//!
//! let fm = pairwise_interaction(&fields).unwrap();
//! // 4 fields of ones: 6 pairs per dimension.
//! assert_eq!(fm.data()[0], 6.0);
//! ```

#![warn(missing_docs)]

pub mod activation;
pub mod dense;
pub mod embedding;
pub mod error;
pub mod initializer;
pub mod interaction;
pub mod layer;
pub mod mlp;
pub mod normalization;
pub mod pooling;
pub mod tensor;

/// Commonly used types.
pub mod prelude {
    pub use crate::activation::{elu, sigmoid, ActivationType};
    pub use crate::dense::Dense;
    pub use crate::embedding::{DenseFieldEmbedding, EmbeddingTable};
    pub use crate::error::{LayerError, LayerResult};
    pub use crate::initializer::{seeded_rng, Initializer};
    pub use crate::interaction::{concat_axis1, concat_fields, pairwise_interaction};
    pub use crate::layer::Layer;
    pub use crate::mlp::{MLPConfig, MLP};
    pub use crate::normalization::BatchNorm;
    pub use crate::pooling::{lookup_and_combine, lookup_sparse, SparseEmbedding};
    pub use crate::tensor::Tensor;
}

pub use error::{LayerError, LayerResult};
pub use tensor::Tensor;
