//! Dense towers.
//!
//! The retrieval user tower is an [`MLP`]: dense layers with an activation
//! after each, and optional batch normalization and dropout between
//! consecutive layers but never after the output layer.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::ActivationType;
use crate::dense::Dense;
use crate::error::LayerError;
use crate::initializer::seeded_rng;
use crate::layer::Layer;
use crate::normalization::BatchNorm;
use crate::tensor::Tensor;

/// Configuration for building an MLP.
///
/// # Example
///
/// ```
/// use libreco_layers::activation::ActivationType;
/// use libreco_layers::mlp::MLPConfig;
///
/// let config = MLPConfig::new(128)
///     .add_layer(64, ActivationType::Elu)
///     .add_layer(16, ActivationType::Elu)
///     .with_batch_norm(true)
///     .with_dropout(0.2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Width of the tower input.
    pub input_dim: usize,
    /// `(width, activation)` of every layer, output layer last.
    pub layers: Vec<(usize, ActivationType)>,
    /// Batch-normalize hidden outputs.
    pub use_bn: bool,
    /// Dropout rate of hidden outputs, 0 disables dropout.
    pub dropout_rate: f32,
}

impl MLPConfig {
    /// Creates a new MLP configuration with the specified input dimension.
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            layers: Vec::new(),
            use_bn: false,
            dropout_rate: 0.0,
        }
    }

    /// Adds a layer to the MLP configuration.
    pub fn add_layer(mut self, output_dim: usize, activation: ActivationType) -> Self {
        self.layers.push((output_dim, activation));
        self
    }

    /// Sets whether hidden outputs are batch-normalized.
    pub fn with_batch_norm(mut self, use_bn: bool) -> Self {
        self.use_bn = use_bn;
        self
    }

    /// Sets the dropout rate.
    pub fn with_dropout(mut self, rate: f32) -> Self {
        self.dropout_rate = rate;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), LayerError> {
        if self.input_dim == 0 {
            return Err(LayerError::config("tower input width must be positive"));
        }
        if self.layers.is_empty() {
            return Err(LayerError::config("tower needs at least one layer"));
        }
        if let Some(i) = self.layers.iter().position(|(width, _)| *width == 0) {
            return Err(LayerError::config(format!("tower layer {i} has zero width")));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(LayerError::config(format!(
                "dropout rate must be in [0, 1), got {}",
                self.dropout_rate
            )));
        }
        Ok(())
    }

    /// Builds the MLP, drawing weights and dropout masks from `seed`.
    pub fn build(self, seed: u64) -> Result<MLP, LayerError> {
        MLP::from_config(self, seed)
    }
}

/// A multi-layer perceptron.
///
/// Each layer is `dense -> activation`; every layer but the last is then
/// followed by batch normalization and dropout when configured.
///
/// # Example
///
/// ```
/// use libreco_layers::activation::ActivationType;
/// use libreco_layers::layer::Layer;
/// use libreco_layers::mlp::MLPConfig;
/// use libreco_layers::tensor::Tensor;
///
/// let mlp = MLPConfig::new(128)
///     .add_layer(64, ActivationType::Elu)
///     .add_layer(10, ActivationType::None)
///     .build(42)
///     .unwrap();
///
/// let input = Tensor::zeros(&[32, 128]);
/// let output = mlp.forward(&input).unwrap();
/// assert_eq!(output.shape(), &[32, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct MLP {
    dense_layers: Vec<Dense>,
    batch_norms: Vec<BatchNorm>,
    config: MLPConfig,
    rng: StdRng,
    training: bool,
}

impl MLP {
    /// Creates an MLP from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn from_config(config: MLPConfig, seed: u64) -> Result<Self, LayerError> {
        config.validate()?;

        let mut rng = seeded_rng(seed);
        let mut dense_layers = Vec::with_capacity(config.layers.len());
        let mut batch_norms = Vec::new();
        let mut prev_dim = config.input_dim;
        for (i, (output_dim, _)) in config.layers.iter().enumerate() {
            dense_layers.push(Dense::new(prev_dim, *output_dim, &mut rng));
            if config.use_bn && i + 1 < config.layers.len() {
                batch_norms.push(BatchNorm::new(*output_dim));
            }
            prev_dim = *output_dim;
        }

        Ok(Self {
            dense_layers,
            batch_norms,
            config,
            rng,
            training: false,
        })
    }

    /// Returns the number of layers in the MLP.
    pub fn num_layers(&self) -> usize {
        self.dense_layers.len()
    }

    /// Returns a reference to the dense layers.
    pub fn dense_layers(&self) -> &[Dense] {
        &self.dense_layers
    }

    /// Returns the batch normalization layers, one per hidden layer when enabled.
    pub fn batch_norms(&self) -> &[BatchNorm] {
        &self.batch_norms
    }

    /// Returns the configuration used to build this MLP.
    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    /// Returns the input dimension.
    pub fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    /// Returns the output dimension.
    pub fn output_dim(&self) -> usize {
        self.config.layers.last().map(|(d, _)| *d).unwrap_or(0)
    }

    fn is_hidden(&self, layer: usize) -> bool {
        layer + 1 < self.dense_layers.len()
    }

    /// Training forward pass: batch statistics update the running ones and
    /// dropout masks are sampled.
    pub fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let rate = self.config.dropout_rate;
        let mut x = input.clone();
        for i in 0..self.dense_layers.len() {
            x = self.dense_layers[i].forward(&x)?;
            x = self.config.layers[i].1.apply(&x);
            if !self.is_hidden(i) {
                continue;
            }
            if let Some(bn) = self.batch_norms.get_mut(i) {
                x = bn.forward_train(&x)?;
            }
            if rate > 0.0 {
                let keep = 1.0 - rate;
                let rng = &mut self.rng;
                for v in x.data_mut() {
                    *v = if rng.gen::<f32>() < rate { 0.0 } else { *v / keep };
                }
            }
        }
        Ok(x)
    }
}

impl Layer for MLP {
    /// Dropout is the identity here; batch norm follows the training flag.
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        let mut x = input.clone();
        for (i, dense) in self.dense_layers.iter().enumerate() {
            x = dense.forward(&x)?;
            x = self.config.layers[i].1.apply(&x);
            if let (true, Some(bn)) = (self.is_hidden(i), self.batch_norms.get(i)) {
                x = bn.forward(&x)?;
            }
        }
        Ok(x)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::new();
        for dense in &self.dense_layers {
            params.extend(dense.parameters());
        }
        for bn in &self.batch_norms {
            params.extend(bn.parameters());
        }
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::new();
        for dense in &mut self.dense_layers {
            params.extend(dense.parameters_mut());
        }
        for bn in &mut self.batch_norms {
            params.extend(bn.parameters_mut());
        }
        params
    }

    fn name(&self) -> &str {
        "MLP"
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for bn in &mut self.batch_norms {
            bn.set_training(training);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower(use_bn: bool, dropout: f32) -> MLP {
        MLPConfig::new(6)
            .add_layer(8, ActivationType::Elu)
            .add_layer(4, ActivationType::Elu)
            .add_layer(3, ActivationType::Elu)
            .with_batch_norm(use_bn)
            .with_dropout(dropout)
            .build(7)
            .unwrap()
    }

    fn input() -> Tensor {
        Tensor::from_data(&[4, 6], (0..24).map(|x| (x as f32 - 12.0) / 10.0).collect())
    }

    #[test]
    fn test_shapes_and_params() {
        let mlp = tower(true, 0.0);
        assert_eq!(mlp.num_layers(), 3);
        assert_eq!(mlp.batch_norms().len(), 2);
        assert_eq!(mlp.output_dim(), 3);
        let expected = (6 * 8 + 8) + (8 * 4 + 4) + (4 * 3 + 3) + 2 * 8 + 2 * 4;
        assert_eq!(mlp.num_params(), expected);
        assert_eq!(mlp.forward(&input()).unwrap().shape(), &[4, 3]);
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = tower(false, 0.0);
        let b = tower(false, 0.0);
        assert_eq!(a.forward(&input()).unwrap(), b.forward(&input()).unwrap());
    }

    #[test]
    fn test_dropout_only_in_training() {
        let mut mlp = tower(false, 0.5);
        let eval = mlp.forward(&input()).unwrap();
        assert_eq!(eval, mlp.forward(&input()).unwrap());

        let train = mlp.forward_train(&input()).unwrap();
        assert_eq!(train.shape(), eval.shape());
        assert_ne!(train, eval);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(MLPConfig::new(0).add_layer(1, ActivationType::Elu).validate().is_err());
        assert!(MLPConfig::new(3).validate().is_err());
        assert!(MLPConfig::new(3)
            .add_layer(0, ActivationType::Elu)
            .validate()
            .is_err());
        assert!(MLPConfig::new(3)
            .add_layer(2, ActivationType::Elu)
            .with_dropout(1.0)
            .build(0)
            .is_err());
    }

    #[test]
    fn test_training_flag_reaches_batch_norm() {
        let mut mlp = tower(true, 0.0);
        mlp.set_training(true);
        assert!(mlp.batch_norms().iter().all(|bn| bn.is_training()));
        let before = mlp.batch_norms()[0].running_stats().0.clone();
        mlp.forward_train(&input()).unwrap();
        assert_ne!(mlp.batch_norms()[0].running_stats().0, &before);
    }
}
