//! Model input batches.

use libreco_core::{DenseBatch, FieldSizes, IndexBatch, ItemId, UserId};

use crate::error::{ModelError, ModelResult};

/// One batch of `(user, item)` examples with their feature rows.
///
/// `sparse` holds the shared-table indices of every sparse slot (user and
/// item fields together, in catalog order); `dense` holds the raw values of
/// every dense field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureBatch {
    /// User id of every example.
    pub users: Vec<UserId>,
    /// Item id of every example.
    pub items: Vec<ItemId>,
    /// Sparse feature indices, `[batch, sparse_field_size]`.
    pub sparse: Option<IndexBatch>,
    /// Dense feature values, `[batch, dense_field_size]`.
    pub dense: Option<DenseBatch>,
}

impl FeatureBatch {
    /// Creates a batch without features.
    pub fn new(users: Vec<UserId>, items: Vec<ItemId>) -> Self {
        Self {
            users,
            items,
            sparse: None,
            dense: None,
        }
    }

    /// Attaches sparse indices.
    pub fn with_sparse(mut self, sparse: IndexBatch) -> Self {
        self.sparse = Some(sparse);
        self
    }

    /// Attaches dense values.
    pub fn with_dense(mut self, dense: DenseBatch) -> Self {
        self.dense = Some(dense);
        self
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the batch has no examples.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Checks the batch against resolved field sizes.
    ///
    /// With `require_items` unset the item column is ignored, which is how
    /// user towers consume batches.
    pub(crate) fn check(&self, sizes: &FieldSizes, require_items: bool) -> ModelResult<()> {
        let n = self.users.len();
        if require_items && self.items.len() != n {
            return Err(ModelError::ShapeMismatch {
                expected: vec![n],
                actual: vec![self.items.len()],
            });
        }

        match (&self.sparse, sizes.has_sparse) {
            (Some(sparse), true) => {
                sparse.check_width(sizes.sparse_field_size)?;
                check_rows("sparse", sparse.batch_size(), n)?;
            }
            (None, true) => return Err(ModelError::config("batch is missing sparse features")),
            (Some(_), false) => {
                return Err(ModelError::config(
                    "batch has sparse features but the catalog declares none",
                ))
            }
            (None, false) => {}
        }

        match (&self.dense, sizes.has_dense) {
            (Some(dense), true) => {
                dense.check_width(sizes.dense_field_size)?;
                check_rows("dense", dense.batch_size(), n)?;
            }
            (None, true) => return Err(ModelError::config("batch is missing dense features")),
            (Some(_), false) => {
                return Err(ModelError::config(
                    "batch has dense features but the catalog declares none",
                ))
            }
            (None, false) => {}
        }
        Ok(())
    }
}

fn check_rows(what: &str, rows: usize, expected: usize) -> ModelResult<()> {
    if rows != expected {
        tracing::warn!(what, rows, expected, "feature rows do not match batch size");
        return Err(ModelError::ShapeMismatch {
            expected: vec![expected],
            actual: vec![rows],
        });
    }
    Ok(())
}
