//! Batch normalization.

use serde::{Deserialize, Serialize};

use crate::error::LayerError;
use crate::layer::Layer;
use crate::tensor::Tensor;

/// Default weight of the current batch in the running statistics.
pub const DEFAULT_MOMENTUM: f32 = 0.01;
/// Default variance epsilon.
pub const DEFAULT_EPS: f32 = 1e-3;

/// Batch Normalization over the feature axis of `[batch, features]` inputs.
///
/// In training mode the batch statistics normalize the input; at inference
/// the running statistics do. [`BatchNorm::forward_train`] additionally folds
/// the batch statistics into the running ones:
/// `running = momentum * batch + (1 - momentum) * running`.
///
/// # Example
///
/// ```
/// use libreco_layers::layer::Layer;
/// use libreco_layers::normalization::BatchNorm;
/// use libreco_layers::tensor::Tensor;
///
/// let bn = BatchNorm::new(2);
/// // Fresh running statistics are mean 0 / variance 1.
/// let out = bn.forward(&Tensor::from_data(&[1, 2], vec![1.0, -1.0])).unwrap();
/// assert!((out.data()[0] - 1.0 / (1.0f32 + 1e-3).sqrt()).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNorm {
    gamma: Tensor,
    beta: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
    momentum: f32,
    eps: f32,
    num_features: usize,
    training: bool,
}

impl BatchNorm {
    /// Unit scale, zero shift, running statistics N(0, 1), inference mode.
    pub fn new(num_features: usize) -> Self {
        Self::with_params(num_features, DEFAULT_MOMENTUM, DEFAULT_EPS)
    }

    /// Same as [`BatchNorm::new`] with explicit momentum and epsilon.
    pub fn with_params(num_features: usize, momentum: f32, eps: f32) -> Self {
        Self {
            gamma: Tensor::ones(&[num_features]),
            beta: Tensor::zeros(&[num_features]),
            running_mean: Tensor::zeros(&[num_features]),
            running_var: Tensor::ones(&[num_features]),
            momentum,
            eps,
            num_features,
            training: false,
        }
    }

    /// Normalized width.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Running `(mean, variance)`.
    pub fn running_stats(&self) -> (&Tensor, &Tensor) {
        (&self.running_mean, &self.running_var)
    }

    fn check_input(&self, input: &Tensor) -> Result<(), LayerError> {
        if input.ndim() != 2 {
            return Err(LayerError::ShapeMismatch {
                expected: vec![0, self.num_features],
                actual: input.shape().to_vec(),
            });
        }
        if input.shape()[1] != self.num_features {
            return Err(LayerError::InvalidInputDimension {
                expected: self.num_features,
                actual: input.shape()[1],
            });
        }
        Ok(())
    }

    fn batch_stats(input: &Tensor) -> (Tensor, Tensor) {
        (input.column_mean(), input.column_var())
    }

    fn normalize(&self, input: &Tensor, mean: &Tensor, var: &Tensor) -> Tensor {
        let dim = self.num_features;
        let mut output = input.data().to_vec();
        for (idx, x) in output.iter_mut().enumerate() {
            let j = idx % dim;
            let x_norm = (*x - mean.data()[j]) / (var.data()[j] + self.eps).sqrt();
            *x = self.gamma.data()[j] * x_norm + self.beta.data()[j];
        }
        Tensor::from_data(input.shape(), output)
    }

    /// Normalizes with batch statistics and updates the running statistics.
    ///
    /// An empty batch is returned unchanged and leaves the statistics as is.
    pub fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.check_input(input)?;
        if input.shape()[0] == 0 {
            return Ok(input.clone());
        }

        let (mean, var) = Self::batch_stats(input);
        let m = self.momentum;
        let om = 1.0 - m;
        for (running, batch) in self.running_mean.data_mut().iter_mut().zip(mean.data()) {
            *running = m * batch + om * *running;
        }
        for (running, batch) in self.running_var.data_mut().iter_mut().zip(var.data()) {
            *running = m * batch + om * *running;
        }
        Ok(self.normalize(input, &mean, &var))
    }
}

impl Layer for BatchNorm {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.check_input(input)?;
        if self.training && input.shape()[0] > 0 {
            let (mean, var) = Self::batch_stats(input);
            Ok(self.normalize(input, &mean, &var))
        } else {
            Ok(self.normalize(input, &self.running_mean, &self.running_var))
        }
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.gamma, &self.beta]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.gamma, &mut self.beta]
    }

    fn name(&self) -> &str {
        "BatchNorm"
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
