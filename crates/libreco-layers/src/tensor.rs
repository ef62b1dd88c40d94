//! Row-major `f32` arrays.
//!
//! Embedding lookups produce `[batch, fields, dim]` tensors, dense stacks
//! work on `[batch, features]`. Only the handful of operations those paths
//! need are provided.

use serde::{Deserialize, Serialize};

/// A multi-dimensional `f32` array stored in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// A tensor of zeros.
    ///
    /// # Example
    ///
    /// ```
    /// use libreco_layers::tensor::Tensor;
    ///
    /// let t = Tensor::zeros(&[2, 3]);
    /// assert_eq!(t.shape(), &[2, 3]);
    /// assert_eq!(t.numel(), 6);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// A tensor of ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// A tensor with every element set to `value`.
    pub fn full(shape: &[usize], value: f32) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    /// Wraps `data` laid out in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not hold exactly one value per element of `shape`.
    pub fn from_data(shape: &[usize], data: Vec<f32>) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            numel,
            "{} values cannot fill shape {:?}",
            data.len(),
            shape
        );
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    /// Dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Flat row-major values.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flat row-major values.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the tensor, returning its values.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    fn row_stride(&self) -> usize {
        assert!(!self.shape.is_empty(), "a scalar tensor has no rows");
        self.shape[1..].iter().product()
    }

    /// The `i`-th slice along the leading axis, flattened.
    ///
    /// # Panics
    ///
    /// Panics on a 0-dimensional tensor or if `i` is out of bounds.
    pub fn row(&self, i: usize) -> &[f32] {
        let stride = self.row_stride();
        &self.data[i * stride..(i + 1) * stride]
    }

    /// Mutable variant of [`Tensor::row`].
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let stride = self.row_stride();
        &mut self.data[i * stride..(i + 1) * stride]
    }

    /// `[m, k] x [k, n] -> [m, n]`.
    ///
    /// # Panics
    ///
    /// Panics unless both tensors are 2D with matching inner dimensions.
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert!(
            self.ndim() == 2 && other.ndim() == 2 && self.shape[1] == other.shape[0],
            "cannot multiply {:?} by {:?}",
            self.shape,
            other.shape
        );
        let (m, n) = (self.shape[0], other.shape[1]);
        let mut out = vec![0.0; m * n];
        for (a_row, out_row) in self.data.chunks(self.shape[1].max(1)).zip(out.chunks_mut(n.max(1))) {
            for (&a, b_row) in a_row.iter().zip(other.data.chunks(n.max(1))) {
                for (o, &b) in out_row.iter_mut().zip(b_row) {
                    *o += a * b;
                }
            }
        }
        Tensor::from_data(&[m, n], out)
    }

    /// Transpose of a 2D tensor.
    pub fn transpose(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "transpose requires a 2D tensor");
        let (m, n) = (self.shape[0], self.shape[1]);
        let data = (0..n)
            .flat_map(|j| (0..m).map(move |i| (i, j)))
            .map(|(i, j)| self.data[i * n + j])
            .collect();
        Tensor::from_data(&[n, m], data)
    }

    /// Element-wise sum.
    ///
    /// `other` may also be a single value, or a `[n]` bias added to every row
    /// of a `[m, n]` tensor.
    ///
    /// # Panics
    ///
    /// Panics if the shapes cannot be broadcast.
    pub fn add(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let data = self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect();
            return Tensor::from_data(&self.shape, data);
        }
        if other.numel() == 1 {
            let value = other.data[0];
            return self.map(|a| a + value);
        }
        assert!(
            self.ndim() == 2 && other.ndim() == 1 && self.shape[1] == other.shape[0],
            "cannot broadcast {:?} and {:?}",
            self.shape,
            other.shape
        );
        let mut out = self.clone();
        for row in out.data.chunks_mut(other.numel()) {
            for (x, b) in row.iter_mut().zip(&other.data) {
                *x += b;
            }
        }
        out
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Per-column mean of a 2D tensor, zero for an empty one.
    pub fn column_mean(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "column statistics require a 2D tensor");
        let (m, n) = (self.shape[0], self.shape[1]);
        let mut sums = vec![0.0; n];
        for row in self.data.chunks(n.max(1)) {
            for (s, x) in sums.iter_mut().zip(row) {
                *s += x;
            }
        }
        let count = m.max(1) as f32;
        Tensor::from_data(&[n], sums.into_iter().map(|s| s / count).collect())
    }

    /// Per-column population variance of a 2D tensor.
    pub fn column_var(&self) -> Tensor {
        let mean = self.column_mean();
        let (m, n) = (self.shape[0], self.shape[1]);
        let mut sq = vec![0.0; n];
        for row in self.data.chunks(n.max(1)) {
            for ((s, x), mu) in sq.iter_mut().zip(row).zip(&mean.data) {
                *s += (x - mu) * (x - mu);
            }
        }
        let count = m.max(1) as f32;
        Tensor::from_data(&[n], sq.into_iter().map(|s| s / count).collect())
    }

    /// Applies `f` to every element.
    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f32) -> f32,
    {
        Tensor::from_data(&self.shape, self.data.iter().map(|&x| f(x)).collect())
    }

    /// Same values under a new shape.
    ///
    /// # Panics
    ///
    /// Panics if the element counts differ.
    pub fn reshape(&self, new_shape: &[usize]) -> Tensor {
        Tensor::from_data(new_shape, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let t = Tensor::zeros(&[2, 3]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.sum(), 0.0);
        assert_eq!(Tensor::ones(&[3, 2]).sum(), 6.0);
        assert_eq!(Tensor::full(&[2], 2.5).data(), &[2.5, 2.5]);
    }

    #[test]
    #[should_panic(expected = "cannot fill shape")]
    fn test_from_data_checks_length() {
        Tensor::from_data(&[2, 2], vec![1.0; 3]);
    }

    #[test]
    fn test_rows_of_3d_tensor() {
        let t = Tensor::from_data(&[2, 2, 2], (0..8).map(|x| x as f32).collect());
        assert_eq!(t.row(1), &[4.0, 5.0, 6.0, 7.0]);

        let mut t = Tensor::zeros(&[3, 2]);
        t.row_mut(2).copy_from_slice(&[1.0, 2.0]);
        assert_eq!(t.data(), &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_matmul_and_transpose() {
        let a = Tensor::from_data(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let c = a.matmul(&a.transpose());
        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.data(), &[14.0, 32.0, 32.0, 77.0]);
        assert_eq!(a.transpose().data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_add_broadcast() {
        let a = Tensor::from_data(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let bias = Tensor::from_data(&[3], vec![10.0, 20.0, 30.0]);
        assert_eq!(a.add(&bias).data(), &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
        assert_eq!(a.add(&Tensor::ones(&[1])).data()[0], 2.0);
        assert_eq!(a.add(&a).sum(), 42.0);
    }

    #[test]
    fn test_column_statistics() {
        let a = Tensor::from_data(&[2, 3], vec![1.0, 2.0, 3.0, 5.0, 6.0, 7.0]);
        assert_eq!(a.column_mean().data(), &[3.0, 4.0, 5.0]);
        assert_eq!(a.column_var().data(), &[4.0, 4.0, 4.0]);
        assert_eq!(Tensor::zeros(&[0, 2]).column_mean().data(), &[0.0, 0.0]);
    }
}
