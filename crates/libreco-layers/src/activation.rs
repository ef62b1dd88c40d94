//! Element-wise activations.

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Activation choices for dense stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationType {
    /// Exponential linear unit with alpha 1.
    #[default]
    Elu,
    /// Logistic sigmoid.
    Sigmoid,
    /// No activation (identity)
    None,
}

impl ActivationType {
    /// Applies the activation element-wise.
    pub fn apply(&self, input: &Tensor) -> Tensor {
        match self {
            ActivationType::Elu => input.map(|x| elu(x, 1.0)),
            ActivationType::Sigmoid => input.map(sigmoid),
            ActivationType::None => input.clone(),
        }
    }
}

/// `x` if positive, else `alpha * (exp(x) - 1)`.
#[inline]
pub fn elu(x: f32, alpha: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        alpha * x.exp_m1()
    }
}

/// `1 / (1 + exp(-x))`, evaluated without overflow for large `|x|`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elu() {
        assert!((elu(-1.0, 1.0) - ((-1.0f32).exp() - 1.0)).abs() < 1e-6);
        assert!((elu(-1.0, 0.5) - 0.5 * ((-1.0f32).exp() - 1.0)).abs() < 1e-6);
        assert_eq!(elu(0.0, 1.0), 0.0);
        assert_eq!(elu(2.0, 1.0), 2.0);
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(-200.0) >= 0.0 && sigmoid(-200.0) < 1e-6);
        assert!((sigmoid(200.0) - 1.0).abs() < 1e-6);
        assert!(!sigmoid(-1000.0).is_nan());
    }

    #[test]
    fn test_activation_type() {
        let input = Tensor::from_data(&[2], vec![-2.0, 3.0]);
        assert_eq!(ActivationType::None.apply(&input), input);
        assert_eq!(ActivationType::Elu.apply(&input).data()[1], 3.0);
        assert!((ActivationType::Sigmoid.apply(&input).data()[0] - sigmoid(-2.0)).abs() < 1e-7);
    }
}
