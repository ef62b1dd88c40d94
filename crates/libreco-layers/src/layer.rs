//! The forward-only layer abstraction.

use crate::error::LayerError;
use crate::tensor::Tensor;

/// A stage of a model that maps one tensor to another.
///
/// Forward passes borrow the layer immutably so a built model can serve
/// concurrent lookups. Layers whose behavior differs during training
/// (batch normalization) track a flag through [`Layer::set_training`].
///
/// # Example
///
/// ```
/// use libreco_layers::dense::Dense;
/// use libreco_layers::initializer::seeded_rng;
/// use libreco_layers::layer::Layer;
/// use libreco_layers::tensor::Tensor;
///
/// let layer = Dense::new(4, 3, &mut seeded_rng(0));
/// let out = layer.forward(&Tensor::ones(&[2, 4])).unwrap();
/// assert_eq!(out.shape(), &[2, 3]);
/// assert_eq!(layer.num_params(), 4 * 3 + 3);
/// ```
pub trait Layer: Send + Sync {
    /// Computes the layer output.
    ///
    /// # Errors
    ///
    /// Returns a [`LayerError`] if `input` has the wrong shape.
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError>;

    /// Learnable tensors.
    fn parameters(&self) -> Vec<&Tensor>;

    /// Learnable tensors, for optimizers.
    fn parameters_mut(&mut self) -> Vec<&mut Tensor>;

    /// Total number of learnable scalars.
    fn num_params(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether forward passes use training behavior.
    fn is_training(&self) -> bool {
        false
    }

    /// Switches between training and inference behavior.
    fn set_training(&mut self, _training: bool) {}
}
