//! Embedding tables.
//!
//! An [`EmbeddingTable`] is a dense `(rows, dim)` matrix addressed by integer
//! index. Tables built for a vocabulary carry one extra row, the OOV
//! sentinel, so encoded unseen values always resolve to a real row.
//!
//! Some rows can be *zero-pinned*: they are zero-filled at construction and
//! every update through [`EmbeddingTable::apply_update`] leaves them at zero.
//! Multi-valued sparse fields pin their padding rows this way.
//!
//! [`DenseFieldEmbedding`] turns continuous features into field vectors by
//! scaling one learned vector per field with the feature value.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use libreco_core::DenseBatch;

use crate::error::{LayerError, LayerResult};
use crate::initializer::Initializer;
use crate::layer::Layer;
use crate::tensor::Tensor;

/// Dense row-addressed embedding matrix.
///
/// # Example
///
/// ```
/// use libreco_layers::embedding::EmbeddingTable;
/// use libreco_layers::initializer::{seeded_rng, Initializer};
///
/// // 3 known users plus the OOV row.
/// let table = EmbeddingTable::for_vocabulary("user", 3, 8, Initializer::GlorotUniform, &mut seeded_rng(0));
/// assert_eq!(table.num_rows(), 4);
/// assert_eq!(table.oov_index(), 3);
///
/// let rows = table.lookup(&[0, 3]).unwrap();
/// assert_eq!(rows.shape(), &[2, 8]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTable {
    name: String,
    weights: Tensor,
    zero_rows: Vec<usize>,
}

impl EmbeddingTable {
    /// Creates a table of exactly `rows` rows.
    pub fn new(
        name: impl Into<String>,
        rows: usize,
        dim: usize,
        initializer: Initializer,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            name: name.into(),
            weights: initializer.initialize(&[rows, dim], rng),
            zero_rows: Vec::new(),
        }
    }

    /// Creates a table for a vocabulary of `vocab_size` values plus the OOV row.
    pub fn for_vocabulary(
        name: impl Into<String>,
        vocab_size: usize,
        dim: usize,
        initializer: Initializer,
        rng: &mut StdRng,
    ) -> Self {
        Self::new(name, vocab_size + 1, dim, initializer, rng)
    }

    /// Wraps existing `(rows, dim)` weights.
    pub fn from_weights(name: impl Into<String>, weights: Tensor) -> LayerResult<Self> {
        if weights.ndim() != 2 {
            return Err(LayerError::ShapeMismatch {
                expected: vec![0, 0],
                actual: weights.shape().to_vec(),
            });
        }
        Ok(Self {
            name: name.into(),
            weights,
            zero_rows: Vec::new(),
        })
    }

    /// Pins `rows` to zero.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::IndexOutOfRange`] if a row does not exist.
    pub fn with_zero_rows(mut self, rows: &[usize]) -> LayerResult<Self> {
        for &row in rows {
            self.check_row(row)?;
        }
        self.zero_rows.extend_from_slice(rows);
        self.zero_rows.sort_unstable();
        self.zero_rows.dedup();
        for i in 0..self.zero_rows.len() {
            let row = self.zero_rows[i];
            self.weights.row_mut(row).fill(0.0);
        }
        Ok(self)
    }

    /// Table name, used in error messages and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows, including the OOV row when present.
    pub fn num_rows(&self) -> usize {
        self.weights.shape()[0]
    }

    /// Embedding dimension.
    pub fn dim(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Index of the last row, the OOV sentinel of vocabulary tables.
    pub fn oov_index(&self) -> usize {
        self.num_rows().saturating_sub(1)
    }

    /// The full weight matrix.
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// Rows kept at zero.
    pub fn zero_rows(&self) -> &[usize] {
        &self.zero_rows
    }

    fn check_row(&self, row: usize) -> LayerResult<()> {
        if row >= self.num_rows() {
            return Err(LayerError::IndexOutOfRange {
                what: self.name.clone(),
                index: row,
                size: self.num_rows(),
            });
        }
        Ok(())
    }

    /// Returns one row.
    pub fn row(&self, index: usize) -> LayerResult<&[f32]> {
        self.check_row(index)?;
        Ok(self.weights.row(index))
    }

    /// Gathers rows into a `[indices.len(), dim]` tensor.
    pub fn lookup(&self, indices: &[usize]) -> LayerResult<Tensor> {
        let dim = self.dim();
        let mut data = Vec::with_capacity(indices.len() * dim);
        for &index in indices {
            data.extend_from_slice(self.row(index)?);
        }
        Ok(Tensor::from_data(&[indices.len(), dim], data))
    }

    /// Adds `deltas[i]` to row `rows[i]`. Zero-pinned rows are left untouched.
    ///
    /// Repeated rows accumulate.
    ///
    /// # Errors
    ///
    /// Fails without modifying the table if a row is out of range or
    /// `deltas` is not `[rows.len(), dim]`.
    pub fn apply_update(&mut self, rows: &[usize], deltas: &Tensor) -> LayerResult<()> {
        let expected = [rows.len(), self.dim()];
        if deltas.shape() != expected {
            return Err(LayerError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: deltas.shape().to_vec(),
            });
        }
        for &row in rows {
            self.check_row(row)?;
        }
        for (i, &row) in rows.iter().enumerate() {
            if self.zero_rows.binary_search(&row).is_ok() {
                continue;
            }
            for (w, d) in self.weights.row_mut(row).iter_mut().zip(deltas.row(i)) {
                *w += d;
            }
        }
        Ok(())
    }
}

/// Embeds dense features as `value * v_f` for a learned vector `v_f` per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseFieldEmbedding {
    weights: Tensor,
}

impl DenseFieldEmbedding {
    /// Creates `num_fields` vectors of dimension `dim`.
    pub fn new(num_fields: usize, dim: usize, initializer: Initializer, rng: &mut StdRng) -> Self {
        Self {
            weights: initializer.initialize(&[num_fields, dim], rng),
        }
    }

    /// Number of dense fields.
    pub fn num_fields(&self) -> usize {
        self.weights.shape()[0]
    }

    /// Vector dimension.
    pub fn dim(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Embeds a dense batch into `[batch, fields, dim]`.
    pub fn embed(&self, values: &DenseBatch) -> LayerResult<Tensor> {
        values.check_width(self.num_fields())?;
        let input = Tensor::from_data(
            &[values.batch_size(), values.width()],
            values.values().to_vec(),
        );
        self.forward(&input)
    }
}

impl Layer for DenseFieldEmbedding {
    fn forward(&self, input: &Tensor) -> LayerResult<Tensor> {
        if input.ndim() != 2 {
            return Err(LayerError::ShapeMismatch {
                expected: vec![0, self.num_fields()],
                actual: input.shape().to_vec(),
            });
        }
        if input.shape()[1] != self.num_fields() {
            return Err(LayerError::InvalidInputDimension {
                expected: self.num_fields(),
                actual: input.shape()[1],
            });
        }

        let batch_size = input.shape()[0];
        let fields = self.num_fields();
        let dim = self.dim();
        let mut data = Vec::with_capacity(batch_size * fields * dim);
        for b in 0..batch_size {
            for f in 0..fields {
                let value = input.data()[b * fields + f];
                data.extend(self.weights.row(f).iter().map(|w| w * value));
            }
        }
        Ok(Tensor::from_data(&[batch_size, fields, dim], data))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weights]
    }

    fn name(&self) -> &str {
        "DenseFieldEmbedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::seeded_rng;

    fn table() -> EmbeddingTable {
        EmbeddingTable::from_weights(
            "t",
            Tensor::from_data(&[3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_oov_lookup_returns_last_row() {
        let table = table();
        let out = table.lookup(&[table.oov_index()]).unwrap();
        assert_eq!(out.data(), &[5.0, 6.0]);
    }

    #[test]
    fn test_out_of_range_lookup() {
        let err = table().lookup(&[0, 3]).unwrap_err();
        assert_eq!(
            err,
            LayerError::IndexOutOfRange {
                what: "t".to_string(),
                index: 3,
                size: 3
            }
        );
    }

    #[test]
    fn test_zero_rows_survive_updates() {
        let mut table = table().with_zero_rows(&[2]).unwrap();
        assert_eq!(table.row(2).unwrap(), &[0.0, 0.0]);

        let deltas = Tensor::from_data(&[2, 2], vec![1.0, 1.0, 1.0, 1.0]);
        table.apply_update(&[2, 0], &deltas).unwrap();
        assert_eq!(table.row(2).unwrap(), &[0.0, 0.0]);
        assert_eq!(table.row(0).unwrap(), &[2.0, 3.0]);

        assert!(table.apply_update(&[5], &Tensor::zeros(&[1, 2])).is_err());
        assert!(table.apply_update(&[0], &Tensor::zeros(&[1, 3])).is_err());
        assert!(self::table().with_zero_rows(&[3]).is_err());
    }

    #[test]
    fn test_dense_field_embedding() {
        let mut emb = DenseFieldEmbedding::new(2, 3, Initializer::Zeros, &mut seeded_rng(0));
        emb.parameters_mut()[0].data_mut()[..3].fill(1.0);
        emb.parameters_mut()[0].data_mut()[3..].fill(2.0);

        let values = DenseBatch::new(vec![0.5, 1.0, -1.0, 0.0], 2).unwrap();
        let out = emb.embed(&values).unwrap();
        assert_eq!(out.shape(), &[2, 2, 3]);
        assert_eq!(
            out.data(),
            &[0.5, 0.5, 0.5, 2.0, 2.0, 2.0, -1.0, -1.0, -1.0, 0.0, 0.0, 0.0]
        );

        let wrong = DenseBatch::new(vec![1.0; 3], 3).unwrap();
        assert!(matches!(
            emb.embed(&wrong),
            Err(LayerError::ShapeMismatch { .. })
        ));
    }
}
