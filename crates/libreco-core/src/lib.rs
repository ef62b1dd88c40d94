//! Core feature metadata and batch transforms for libreco.
//!
//! This crate holds everything that does not touch floating-point weights:
//!
//! - **Feature catalog**: vocabularies, sparse and dense fields, and the layout
//!   of the shared sparse embedding table.
//! - **Combiner modes**: how multi-valued sparse fields are pooled.
//! - **Field sizes**: field counts and capability flags resolved once per model.
//! - **Index batches**: fixed-width sparse index and dense value batches.
//! - **Histories and windows**: chronological per-user item lists and the
//!   bounded recent / random windows built from them.
//!
//! # Example
//!
//! ```
//! use libreco_core::catalog::{FeatureCatalog, FeatureOwner, SparseField, Vocabulary};
//! use libreco_core::combiner::Combiner;
//! use libreco_core::field_size::resolve;
//!
//! let catalog = FeatureCatalog::new(3, 4)
//!     .with_sparse_field(SparseField::single(
//!         "gender",
//!         FeatureOwner::User,
//!         Vocabulary::from_values(["F", "M"]),
//!     ))
//!     .with_sparse_field(SparseField::multi(
//!         "genres",
//!         FeatureOwner::User,
//!         Vocabulary::from_values(["action", "drama"]),
//!         3,
//!     ));
//!
//! let sizes = resolve(&catalog, Combiner::SqrtN).unwrap();
//! assert_eq!(sizes.sparse_field_size, 4);
//! assert_eq!(sizes.true_sparse_field_size, 2);
//!
//! let row = catalog.encode_sparse_row(&[vec!["M"], vec!["drama"]]).unwrap();
//! assert_eq!(row, vec![1, 4, 5, 5]);
//! ```
//!
//! # Modules
//!
//! - [`catalog`]: Feature catalog, vocabularies and sparse layout.
//! - [`combiner`]: Multi-valued pooling modes.
//! - [`field_size`]: Field size resolution.
//! - [`batch`]: Index and dense batches.
//! - [`history`]: User consumption histories.
//! - [`sequence`]: Interaction windows.
//! - [`error`]: Error types for the library.

#![warn(missing_docs)]

pub mod batch;
pub mod catalog;
pub mod combiner;
pub mod error;
pub mod field_size;
pub mod history;
pub mod sequence;

/// Dense user index in `[0, n_users)`.
pub type UserId = usize;
/// Dense item index in `[0, n_items)`.
pub type ItemId = usize;
/// Interaction timestamp.
pub type Timestamp = i64;

pub use batch::{DenseBatch, IndexBatch};
pub use catalog::{
    DenseField, FeatureCatalog, FeatureOwner, FieldGroup, MultiSparseInfo, SparseField,
    SparseLayout, Vocabulary,
};
pub use combiner::Combiner;
pub use error::{RecoError, Result};
pub use field_size::{resolve, FieldSizes};
pub use history::{Interaction, UserConsumed, UserHistory};
pub use sequence::{build_windows, seq_mode, SeqMode, SparseIncidence};
