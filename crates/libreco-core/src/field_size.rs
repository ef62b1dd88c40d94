//! Field size resolution.
//!
//! Models size their placeholders and concatenations from the numbers computed
//! here, once, at build time. The capability flags decide which optional
//! stages (sparse, dense) a model assembles.

use serde::{Deserialize, Serialize};

use crate::catalog::FeatureCatalog;
use crate::combiner::Combiner;
use crate::error::Result;

/// Field counts of a catalog under an effective combiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSizes {
    /// Raw sparse slots, multi-valued fields counted once per sub-field.
    pub sparse_field_size: usize,
    /// Logical sparse fields after multi-valued groups are pooled.
    pub true_sparse_field_size: usize,
    /// Dense fields.
    pub dense_field_size: usize,
    /// Rows of the shared sparse embedding table.
    pub sparse_feature_size: usize,
    /// The combiner actually applied.
    pub combiner: Combiner,
    /// Whether a sparse stage is needed.
    pub has_sparse: bool,
    /// Whether a dense stage is needed.
    pub has_dense: bool,
    /// Whether any sparse field is multi-valued.
    pub has_multi_sparse: bool,
}

/// Resolves field counts for `catalog` under the requested combiner.
///
/// A pooling combiner requested for a catalog without multi-valued fields is
/// normalized to [`Combiner::Normal`].
///
/// # Errors
///
/// Returns a configuration error if the catalog is inconsistent, see
/// [`FeatureCatalog::validate`].
///
/// # Examples
///
/// ```
/// use libreco_core::catalog::{FeatureCatalog, FeatureOwner, SparseField, Vocabulary};
/// use libreco_core::combiner::Combiner;
/// use libreco_core::field_size::resolve;
///
/// let catalog = FeatureCatalog::new(10, 10).with_sparse_field(SparseField::multi(
///     "tags",
///     FeatureOwner::User,
///     Vocabulary::from_values(["a", "b"]),
///     5,
/// ));
/// let sizes = resolve(&catalog, Combiner::Mean).unwrap();
/// assert_eq!(sizes.sparse_field_size, 5);
/// assert_eq!(sizes.true_sparse_field_size, 1);
/// ```
pub fn resolve(catalog: &FeatureCatalog, combiner: Combiner) -> Result<FieldSizes> {
    catalog.validate()?;

    let has_multi_sparse = catalog.has_multi_sparse();
    let effective = if has_multi_sparse {
        combiner
    } else {
        Combiner::Normal
    };
    if effective != combiner {
        tracing::debug!(
            requested = %combiner,
            "no multi-valued sparse field, combiner normalized to `normal`"
        );
    }

    let sparse_field_size = catalog.sparse_field_size();
    let true_sparse_field_size = if effective.pools() {
        catalog
            .sparse_fields()
            .iter()
            .map(|f| if f.is_multi() { 1 } else { f.width() })
            .sum()
    } else {
        sparse_field_size
    };

    let sizes = FieldSizes {
        sparse_field_size,
        true_sparse_field_size,
        dense_field_size: catalog.dense_field_size(),
        sparse_feature_size: catalog.sparse_feature_size(),
        combiner: effective,
        has_sparse: catalog.has_sparse(),
        has_dense: catalog.has_dense(),
        has_multi_sparse,
    };
    tracing::debug!(
        sparse_field_size = sizes.sparse_field_size,
        true_sparse_field_size = sizes.true_sparse_field_size,
        dense_field_size = sizes.dense_field_size,
        combiner = %sizes.combiner,
        "resolved field sizes"
    );
    Ok(sizes)
}
