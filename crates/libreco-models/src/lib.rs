//! Recommendation models assembled from libreco layers.
//!
//! - [`fm::FmModel`]: factorization machine over users, items and side
//!   features, with a batch-normalized neural pairwise stage.
//! - [`youtube_retrieval::YouTubeRetrieval`]: two-tower retrieval whose user
//!   tower pools a window of consumed items.
//!
//! Both models resolve their field sizes from a
//! [`FeatureCatalog`](libreco_core::FeatureCatalog) once at build time and
//! assemble only the stages the catalog needs.
//!
//! # Example
//!
//! ```
//! use libreco_core::{FeatureCatalog, FeatureOwner, IndexBatch, SparseField, Vocabulary};
//! use libreco_models::{FeatureBatch, YouTubeRetrieval, YouTubeRetrievalConfig};
//!
//! let catalog = FeatureCatalog::new(2, 6).with_sparse_field(SparseField::single(
//!     "gender",
//!     FeatureOwner::User,
//!     Vocabulary::from_values(["F", "M"]),
//! ));
//! let histories = vec![vec![0, 1, 2], vec![5]];
//! let config = YouTubeRetrievalConfig::default().with_hidden_units("8");
//! let mut model = YouTubeRetrieval::new(&catalog, &histories, config).unwrap();
//!
//! let genders = IndexBatch::new(vec![0, 1], 1).unwrap();
//! model.set_embeddings(Some(genders), None).unwrap();
//! let recs = model.recommend_user(0, 2, true).unwrap();
//! assert_eq!(recs.len(), 2);
//! assert!(recs.iter().all(|(item, _)| *item > 2));
//! ```

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod error;
pub mod fm;
mod ranking;
pub mod youtube_retrieval;

pub use batch::FeatureBatch;
pub use config::{parse_hidden_units, FmConfig, Task, YouTubeRetrievalConfig};
pub use error::{ModelError, ModelResult};
pub use fm::FmModel;
pub use youtube_retrieval::YouTubeRetrieval;
