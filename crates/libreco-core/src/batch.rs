//! Fixed-shape batches of sparse indices and dense values.

use serde::{Deserialize, Serialize};

use crate::error::{RecoError, Result};

fn check_rectangular(len: usize, width: usize) -> Result<usize> {
    if width == 0 {
        return if len == 0 {
            Ok(0)
        } else {
            Err(RecoError::ShapeMismatch {
                expected: vec![0],
                actual: vec![len],
            })
        };
    }
    if len % width != 0 {
        return Err(RecoError::ShapeMismatch {
            expected: vec![len.div_ceil(width), width],
            actual: vec![len],
        });
    }
    Ok(len / width)
}

/// Row-major `(batch, width)` matrix of sparse-table indices.
///
/// # Examples
///
/// ```
/// use libreco_core::batch::IndexBatch;
///
/// let batch = IndexBatch::new(vec![0, 1, 2, 3, 4, 5], 3).unwrap();
/// assert_eq!(batch.batch_size(), 2);
/// assert_eq!(batch.row(1), &[3, 4, 5]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexBatch {
    indices: Vec<usize>,
    batch_size: usize,
    width: usize,
}

impl IndexBatch {
    /// Creates a batch from flattened indices.
    ///
    /// # Errors
    ///
    /// Returns [`RecoError::ShapeMismatch`] if `indices` is not a whole number of rows.
    pub fn new(indices: Vec<usize>, width: usize) -> Result<Self> {
        let batch_size = check_rectangular(indices.len(), width)?;
        Ok(Self {
            indices,
            batch_size,
            width,
        })
    }

    /// Creates a batch from rows that must all have the same width.
    pub fn from_rows(rows: &[Vec<usize>]) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut indices = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(RecoError::ShapeMismatch {
                    expected: vec![width],
                    actual: vec![row.len()],
                });
            }
            indices.extend_from_slice(row);
        }
        Ok(Self {
            indices,
            batch_size: rows.len(),
            width,
        })
    }

    /// Number of examples.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of slots per example.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Flattened indices.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Indices of one example.
    pub fn row(&self, i: usize) -> &[usize] {
        &self.indices[i * self.width..(i + 1) * self.width]
    }

    /// Fails unless every row holds exactly `width` slots.
    pub fn check_width(&self, width: usize) -> Result<()> {
        if self.width != width {
            return Err(RecoError::ShapeMismatch {
                expected: vec![self.batch_size, width],
                actual: vec![self.batch_size, self.width],
            });
        }
        Ok(())
    }

    /// Gathers the given rows into a new batch.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        let mut indices = Vec::with_capacity(rows.len() * self.width);
        for &r in rows {
            if r >= self.batch_size {
                return Err(RecoError::IndexOutOfRange {
                    what: "index batch row".to_string(),
                    index: r,
                    size: self.batch_size,
                });
            }
            indices.extend_from_slice(self.row(r));
        }
        Ok(Self {
            indices,
            batch_size: rows.len(),
            width: self.width,
        })
    }
}

/// Row-major `(batch, width)` matrix of dense feature values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DenseBatch {
    values: Vec<f32>,
    batch_size: usize,
    width: usize,
}

impl DenseBatch {
    /// Creates a batch from flattened values.
    pub fn new(values: Vec<f32>, width: usize) -> Result<Self> {
        let batch_size = check_rectangular(values.len(), width)?;
        Ok(Self {
            values,
            batch_size,
            width,
        })
    }

    /// Number of examples.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of dense fields per example.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Flattened values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Values of one example.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.width..(i + 1) * self.width]
    }

    /// Fails unless every row holds exactly `width` values.
    pub fn check_width(&self, width: usize) -> Result<()> {
        if self.width != width {
            return Err(RecoError::ShapeMismatch {
                expected: vec![self.batch_size, width],
                actual: vec![self.batch_size, self.width],
            });
        }
        Ok(())
    }

    /// Gathers the given rows into a new batch.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        let mut values = Vec::with_capacity(rows.len() * self.width);
        for &r in rows {
            if r >= self.batch_size {
                return Err(RecoError::IndexOutOfRange {
                    what: "dense batch row".to_string(),
                    index: r,
                    size: self.batch_size,
                });
            }
            values.extend_from_slice(self.row(r));
        }
        Ok(Self {
            values,
            batch_size: rows.len(),
            width: self.width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_batch_shape() {
        let batch = IndexBatch::new(vec![1, 2, 3, 4], 2).unwrap();
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.width(), 2);
        assert!(batch.check_width(2).is_ok());
        assert!(matches!(
            batch.check_width(3),
            Err(RecoError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_ragged_input_is_rejected() {
        assert!(IndexBatch::new(vec![1, 2, 3], 2).is_err());
        assert!(IndexBatch::from_rows(&[vec![1, 2], vec![3]]).is_err());
        assert!(DenseBatch::new(vec![1.0], 0).is_err());
    }

    #[test]
    fn test_select_rows() {
        let batch = IndexBatch::from_rows(&[vec![1, 2], vec![3, 4], vec![5, 6]]).unwrap();
        let picked = batch.select_rows(&[2, 0]).unwrap();
        assert_eq!(picked.indices(), &[5, 6, 1, 2]);
        assert!(batch.select_rows(&[3]).is_err());

        let dense = DenseBatch::new(vec![0.5, 1.5, 2.5], 1).unwrap();
        assert_eq!(dense.select_rows(&[1]).unwrap().values(), &[1.5]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = IndexBatch::new(Vec::new(), 0).unwrap();
        assert_eq!(batch.batch_size(), 0);
        let batch = IndexBatch::new(Vec::new(), 4).unwrap();
        assert_eq!(batch.batch_size(), 0);
    }
}
