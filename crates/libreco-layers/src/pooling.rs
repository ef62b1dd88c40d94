//! Combining embedding rows of sparse fields.
//!
//! [`lookup_and_combine`] turns a fixed-width index batch into one vector per
//! logical field, pooling multi-valued fields with a [`Combiner`].
//! [`lookup_sparse`] pools variable-length rows given in coordinate form.
//!
//! Pooling counts only valid entries: padding slots (a multi-valued field's
//! OOV index) contribute neither to the sum nor to the denominator, and a
//! group without valid entries yields the zero vector under every mode.

use libreco_core::{Combiner, FieldGroup, IndexBatch, SparseIncidence, SparseLayout};

use crate::embedding::EmbeddingTable;
use crate::error::{LayerError, LayerResult};
use crate::tensor::Tensor;

/// Number of output fields produced for `layout` under `combiner`.
pub fn num_output_fields(layout: &SparseLayout, combiner: Combiner) -> usize {
    if combiner.pools() {
        layout
            .groups()
            .iter()
            .map(|g| if g.multi { 1 } else { g.width })
            .sum()
    } else {
        layout.num_slots()
    }
}

fn pool_into(
    out: &mut Vec<f32>,
    table: &EmbeddingTable,
    indices: &[usize],
    padding: Option<usize>,
    combiner: Combiner,
) -> LayerResult<()> {
    let start = out.len();
    out.resize(start + table.dim(), 0.0);
    let mut count = 0;
    for &index in indices {
        let row = table.row(index)?;
        if Some(index) == padding {
            continue;
        }
        for (acc, w) in out[start..].iter_mut().zip(row) {
            *acc += w;
        }
        count += 1;
    }
    match combiner.divisor(count) {
        Some(divisor) => out[start..].iter_mut().for_each(|x| *x /= divisor),
        None => out[start..].fill(0.0),
    }
    Ok(())
}

fn lookup_group(
    out: &mut Vec<f32>,
    table: &EmbeddingTable,
    slots: &[usize],
    group: &FieldGroup,
    combiner: Combiner,
) -> LayerResult<()> {
    if group.multi && combiner.pools() {
        pool_into(out, table, slots, Some(group.oov_index), combiner)
    } else {
        for &index in slots {
            out.extend_from_slice(table.row(index)?);
        }
        Ok(())
    }
}

/// Looks up and combines the sparse fields of a batch.
///
/// Returns a `[batch, fields, dim]` tensor where `fields` is
/// [`num_output_fields`]. Single-valued fields, and every slot under
/// [`Combiner::Normal`], are direct row lookups.
///
/// # Errors
///
/// - [`LayerError::ShapeMismatch`] if the batch width differs from the
///   layout's slot count.
/// - [`LayerError::IndexOutOfRange`] if an index is not a row of `table`.
///
/// # Example
///
/// ```
/// use libreco_core::{Combiner, FeatureCatalog, FeatureOwner, IndexBatch, SparseField, Vocabulary};
/// use libreco_layers::embedding::EmbeddingTable;
/// use libreco_layers::pooling::lookup_and_combine;
/// use libreco_layers::tensor::Tensor;
///
/// let catalog = FeatureCatalog::new(1, 1).with_sparse_field(SparseField::multi(
///     "tags",
///     FeatureOwner::User,
///     Vocabulary::from_values(["a", "b"]),
///     3,
/// ));
/// let table = EmbeddingTable::from_weights(
///     "sparse",
///     Tensor::from_data(&[3, 1], vec![2.0, 4.0, 100.0]),
/// )
/// .unwrap();
/// // "a", "b", padding
/// let batch = IndexBatch::new(vec![0, 1, 2], 3).unwrap();
/// let out = lookup_and_combine(&table, &batch, &catalog.layout(), Combiner::Mean).unwrap();
/// assert_eq!(out.shape(), &[1, 1, 1]);
/// assert_eq!(out.data(), &[3.0]);
/// ```
pub fn lookup_and_combine(
    table: &EmbeddingTable,
    batch: &IndexBatch,
    layout: &SparseLayout,
    combiner: Combiner,
) -> LayerResult<Tensor> {
    batch.check_width(layout.num_slots())?;

    let fields = num_output_fields(layout, combiner);
    let dim = table.dim();
    let mut data = Vec::with_capacity(batch.batch_size() * fields * dim);
    for b in 0..batch.batch_size() {
        let row = batch.row(b);
        for group in layout.groups() {
            let slots = &row[group.slot_offset..group.slot_offset + group.width];
            lookup_group(&mut data, table, slots, group, combiner)?;
        }
    }
    Ok(Tensor::from_data(&[batch.batch_size(), fields, dim], data))
}

/// Pools the items of every row of a sparse incidence matrix.
///
/// Row `r` of the `[rows, dim]` result combines the table rows of the values
/// mapped to `r`; rows without entries are zero.
///
/// # Errors
///
/// Returns [`LayerError::IndexOutOfRange`] if an entry addresses a row past
/// the incidence shape or a value past the table.
pub fn lookup_sparse(
    table: &EmbeddingTable,
    incidence: &SparseIncidence,
    combiner: Combiner,
) -> LayerResult<Tensor> {
    if incidence.indices.len() != incidence.values.len() {
        return Err(LayerError::ShapeMismatch {
            expected: vec![incidence.indices.len()],
            actual: vec![incidence.values.len()],
        });
    }

    let rows = incidence.num_rows();
    let mut grouped: Vec<Vec<usize>> = vec![Vec::new(); rows];
    for (idx, &value) in incidence.indices.iter().zip(&incidence.values) {
        let row = idx[0];
        if row >= rows {
            return Err(LayerError::IndexOutOfRange {
                what: "sparse incidence".to_string(),
                index: row,
                size: rows,
            });
        }
        grouped[row].push(value);
    }

    let mut data = Vec::with_capacity(rows * table.dim());
    for values in &grouped {
        pool_into(&mut data, table, values, None, combiner)?;
    }
    Ok(Tensor::from_data(&[rows, table.dim()], data))
}

/// A sparse-field embedding: shared table, field layout and combiner.
///
/// Padding rows of multi-valued fields are zero-pinned on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseEmbedding {
    table: EmbeddingTable,
    layout: SparseLayout,
    combiner: Combiner,
}

impl SparseEmbedding {
    /// Binds a table to a layout.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::ShapeMismatch`] if the table does not have one
    /// row per layout row.
    pub fn new(table: EmbeddingTable, layout: SparseLayout, combiner: Combiner) -> LayerResult<Self> {
        if table.num_rows() != layout.num_rows() {
            return Err(LayerError::ShapeMismatch {
                expected: vec![layout.num_rows(), table.dim()],
                actual: vec![table.num_rows(), table.dim()],
            });
        }
        let padding = layout.padding_rows();
        let table = table.with_zero_rows(&padding)?;
        tracing::debug!(
            table = table.name(),
            rows = table.num_rows(),
            pinned = padding.len(),
            combiner = %combiner,
            "bound sparse embedding table"
        );
        Ok(Self {
            table,
            layout,
            combiner,
        })
    }

    /// The underlying table.
    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    /// Mutable access for optimizers, see [`EmbeddingTable::apply_update`].
    pub fn table_mut(&mut self) -> &mut EmbeddingTable {
        &mut self.table
    }

    /// The effective combiner.
    pub fn combiner(&self) -> Combiner {
        self.combiner
    }

    /// Number of fields each example is embedded into.
    pub fn num_fields(&self) -> usize {
        num_output_fields(&self.layout, self.combiner)
    }

    /// Embeds a batch into `[batch, fields, dim]`.
    pub fn embed(&self, batch: &IndexBatch) -> LayerResult<Tensor> {
        lookup_and_combine(&self.table, batch, &self.layout, self.combiner)
    }
}
