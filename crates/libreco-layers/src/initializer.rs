//! Seeded weight initialization.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Creates the generator every model builds its weights from.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Weight initialization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Initializer {
    /// Glorot/Xavier uniform initialization.
    #[default]
    GlorotUniform,
    /// All zeros, for biases.
    Zeros,
}

impl Initializer {
    /// Draws a tensor of `shape` from this scheme.
    ///
    /// # Example
    ///
    /// ```
    /// use libreco_layers::initializer::{seeded_rng, Initializer};
    ///
    /// let a = Initializer::GlorotUniform.initialize(&[4, 3], &mut seeded_rng(7));
    /// let b = Initializer::GlorotUniform.initialize(&[4, 3], &mut seeded_rng(7));
    /// assert_eq!(a, b);
    /// ```
    pub fn initialize(&self, shape: &[usize], rng: &mut StdRng) -> Tensor {
        match self {
            Initializer::Zeros => Tensor::zeros(shape),
            Initializer::GlorotUniform => {
                let (fan_in, fan_out) = fan_in_out(shape);
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                let dist = Uniform::new_inclusive(-limit, limit);
                let numel: usize = shape.iter().product();
                let data: Vec<f32> = dist.sample_iter(&mut *rng).take(numel).collect();
                Tensor::from_data(shape, data)
            }
        }
    }
}

fn fan_in_out(shape: &[usize]) -> (usize, usize) {
    if shape.len() >= 2 {
        let receptive: usize = shape[..shape.len() - 2].iter().product();
        let fan_in = shape[shape.len() - 2] * receptive;
        let fan_out = shape[shape.len() - 1] * receptive;
        (fan_in.max(1), fan_out.max(1))
    } else if shape.len() == 1 {
        let dim = shape[0].max(1);
        (dim, dim)
    } else {
        (1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glorot_uniform_bounds() {
        let t = Initializer::GlorotUniform.initialize(&[10, 6], &mut seeded_rng(1));
        let limit = (6.0f32 / 16.0).sqrt();
        assert!(t.data().iter().all(|x| x.abs() <= limit));
        assert!(t.data().iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_seed_changes_values() {
        let a = Initializer::GlorotUniform.initialize(&[8], &mut seeded_rng(1));
        let b = Initializer::GlorotUniform.initialize(&[8], &mut seeded_rng(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_zeros_leave_rng_untouched() {
        let mut rng = seeded_rng(3);
        let zeros = Initializer::Zeros.initialize(&[2, 3], &mut rng);
        assert_eq!(zeros, Tensor::zeros(&[2, 3]));

        let after = Initializer::GlorotUniform.initialize(&[4], &mut rng);
        let fresh = Initializer::GlorotUniform.initialize(&[4], &mut seeded_rng(3));
        assert_eq!(after, fresh);
    }
}
