//! Fully connected projection `y = xW + b`.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::LayerError;
use crate::initializer::Initializer;
use crate::layer::Layer;
use crate::tensor::Tensor;

/// Affine map from `[batch, in]` to `[batch, out]`.
///
/// Weights are Glorot-uniform and the bias starts at zero, matching how
/// every projection in the FM and retrieval models is initialized.
///
/// # Example
///
/// ```
/// use libreco_layers::dense::Dense;
/// use libreco_layers::initializer::seeded_rng;
/// use libreco_layers::layer::Layer;
/// use libreco_layers::tensor::Tensor;
///
/// let layer = Dense::new(16, 1, &mut seeded_rng(42));
/// let logits = layer.forward(&Tensor::zeros(&[8, 16])).unwrap();
/// assert_eq!(logits.shape(), &[8, 1]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    weights: Tensor,
    bias: Tensor,
}

impl Dense {
    /// Draws a fresh `in_features -> out_features` projection from `rng`.
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        Self {
            weights: Initializer::GlorotUniform.initialize(&[in_features, out_features], rng),
            bias: Initializer::Zeros.initialize(&[out_features], rng),
        }
    }

    /// Wraps explicit weights `[in, out]` and bias `[out]`.
    pub fn from_weights(weights: Tensor, bias: Tensor) -> Result<Self, LayerError> {
        if weights.ndim() != 2 || bias.shape() != [weights.shape()[1]] {
            return Err(LayerError::ShapeMismatch {
                expected: weights.shape().to_vec(),
                actual: bias.shape().to_vec(),
            });
        }
        Ok(Self { weights, bias })
    }

    /// Input width.
    pub fn in_features(&self) -> usize {
        self.weights.shape()[0]
    }

    /// Output width.
    pub fn out_features(&self) -> usize {
        self.weights.shape()[1]
    }

    /// `[in, out]` weights.
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// `[out]` bias.
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }
}

impl Layer for Dense {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        match input.shape() {
            [_, width] if *width == self.in_features() => {
                Ok(input.matmul(&self.weights).add(&self.bias))
            }
            [_, width] => Err(LayerError::InvalidInputDimension {
                expected: self.in_features(),
                actual: *width,
            }),
            other => Err(LayerError::ShapeMismatch {
                expected: vec![0, self.in_features()],
                actual: other.to_vec(),
            }),
        }
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weights, &mut self.bias]
    }

    fn name(&self) -> &str {
        "Dense"
    }
}
