//! Field interactions.
//!
//! - [`pairwise_interaction`]: the factorization-machine second-order term.
//! - [`concat_fields`]: flattens field vectors for deep towers.
//! - [`concat_axis1`]: joins field blocks or feature blocks of one batch.

use crate::error::{LayerError, LayerResult};
use crate::tensor::Tensor;

fn check_fields(fields: &Tensor) -> LayerResult<(usize, usize, usize)> {
    if fields.ndim() != 3 {
        return Err(LayerError::ShapeMismatch {
            expected: vec![0, 0, 0],
            actual: fields.shape().to_vec(),
        });
    }
    let shape = fields.shape();
    Ok((shape[0], shape[1], shape[2]))
}

/// Second-order FM interaction of `[batch, fields, dim]` vectors.
///
/// Computes `0.5 * ((sum_i v_i)^2 - sum_i v_i^2)` per dimension, which equals
/// the sum over field pairs `i < j` of `v_i * v_j`. The result is
/// `[batch, dim]`; fewer than two fields give zeros.
///
/// # Example
///
/// ```
/// use libreco_layers::interaction::pairwise_interaction;
/// use libreco_layers::tensor::Tensor;
///
/// let fields = Tensor::from_data(&[1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
/// let out = pairwise_interaction(&fields).unwrap();
/// assert_eq!(out.data(), &[3.0, 8.0]);
/// ```
pub fn pairwise_interaction(fields: &Tensor) -> LayerResult<Tensor> {
    let (batch_size, num_fields, dim) = check_fields(fields)?;

    let mut out = Vec::with_capacity(batch_size * dim);
    let mut sum = vec![0.0f32; dim];
    let mut sum_sq = vec![0.0f32; dim];
    for b in 0..batch_size {
        sum.fill(0.0);
        sum_sq.fill(0.0);
        let example = fields.row(b);
        for f in 0..num_fields {
            for (k, &v) in example[f * dim..(f + 1) * dim].iter().enumerate() {
                sum[k] += v;
                sum_sq[k] += v * v;
            }
        }
        out.extend(sum.iter().zip(&sum_sq).map(|(s, sq)| 0.5 * (s * s - sq)));
    }
    Ok(Tensor::from_data(&[batch_size, dim], out))
}

/// Flattens `[batch, fields, dim]` into `[batch, fields * dim]`.
pub fn concat_fields(fields: &Tensor) -> LayerResult<Tensor> {
    let (batch_size, num_fields, dim) = check_fields(fields)?;
    Ok(fields.reshape(&[batch_size, num_fields * dim]))
}

/// Concatenates tensors along axis 1.
///
/// All parts must have the same rank and agree on every axis except axis 1:
/// `[B, F1, K]` and `[B, F2, K]` give `[B, F1 + F2, K]`, and `[B, a]` and
/// `[B, b]` give `[B, a + b]`.
///
/// # Errors
///
/// Returns [`LayerError::ShapeMismatch`] when the parts disagree, and
/// [`LayerError::ConfigError`] for an empty list.
pub fn concat_axis1(parts: &[&Tensor]) -> LayerResult<Tensor> {
    let first = parts
        .first()
        .ok_or_else(|| LayerError::config("concat_axis1 expects at least one tensor"))?;
    if first.ndim() < 2 {
        return Err(LayerError::ShapeMismatch {
            expected: vec![first.numel(), 1],
            actual: first.shape().to_vec(),
        });
    }

    let batch_size = first.shape()[0];
    let tail = &first.shape()[2..];
    let mut width = 0;
    for part in parts {
        let shape = part.shape();
        if shape.len() != first.ndim() || shape[0] != batch_size || &shape[2..] != tail {
            let mut expected = first.shape().to_vec();
            if shape.len() == expected.len() {
                expected[1] = shape[1];
            }
            return Err(LayerError::ShapeMismatch {
                expected,
                actual: shape.to_vec(),
            });
        }
        width += shape[1];
    }

    let total: usize = parts.iter().map(|p| p.numel()).sum();
    let mut data = Vec::with_capacity(total);
    for b in 0..batch_size {
        for part in parts {
            data.extend_from_slice(part.row(b));
        }
    }
    let mut shape = vec![batch_size, width];
    shape.extend_from_slice(tail);
    Ok(Tensor::from_data(&shape, data))
}
