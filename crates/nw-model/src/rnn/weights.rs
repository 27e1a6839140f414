use nw_tensor::{Shape, Tensor};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::RnnConfig;
use crate::error::{ModelError, Result};

/// Weight tensors of a `RecurrentModel`.
///
/// All matrices are row-major with the output dimension first, so a layer is
/// applied as `W @ x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RnnWeights {
    /// Token embeddings, shape [vocab_size, embedding_dim]. Not trained.
    pub embedding: Tensor,
    /// Input projection, shape [hidden_units, embedding_dim].
    pub w_xh: Tensor,
    /// Recurrent projection, shape [hidden_units, hidden_units].
    pub w_hh: Tensor,
    /// Hidden bias, length hidden_units.
    pub b_h: Tensor,
    /// Readout projection, shape [vocab_size, hidden_units].
    pub w_hy: Tensor,
    /// Readout bias, length vocab_size.
    pub b_y: Tensor,
}

impl RnnWeights {
    /// Initialise trainable weights around a fixed embedding matrix.
    pub fn init<R: Rng + ?Sized>(
        config: &RnnConfig,
        embedding: Tensor,
        rng: &mut R,
    ) -> Result<RnnWeights> {
        let h = config.hidden_units;
        let weights = RnnWeights {
            embedding,
            w_xh: Tensor::glorot(h, config.embedding_dim, rng),
            w_hh: Tensor::glorot(h, h, rng),
            b_h: Tensor::zeros(Shape::vector(h)),
            w_hy: Tensor::glorot(config.vocab_size, h, rng),
            b_y: Tensor::zeros(Shape::vector(config.vocab_size)),
        };
        weights.check(config)?;
        Ok(weights)
    }

    /// Verify every tensor is internally consistent and sized for `config`.
    pub fn check(&self, config: &RnnConfig) -> Result<()> {
        let expected = [
            ("embedding", &self.embedding, vec![config.vocab_size, config.embedding_dim]),
            ("w_xh", &self.w_xh, vec![config.hidden_units, config.embedding_dim]),
            ("w_hh", &self.w_hh, vec![config.hidden_units, config.hidden_units]),
            ("b_h", &self.b_h, vec![config.hidden_units]),
            ("w_hy", &self.w_hy, vec![config.vocab_size, config.hidden_units]),
            ("b_y", &self.b_y, vec![config.vocab_size]),
        ];
        for (name, tensor, dims) in expected {
            tensor.validate()?;
            if tensor.shape().dims() != dims.as_slice() {
                return Err(ModelError::InvalidConfig(format!(
                    "{name} has shape {} but the config requires {}",
                    tensor.shape(),
                    Shape::new(dims)
                )));
            }
        }
        Ok(())
    }

    /// Trainable parameters in a fixed order shared with `Gradients::parts`.
    pub(crate) fn trainable_mut(&mut self) -> [&mut [f32]; 5] {
        [
            self.w_xh.data_mut(),
            self.w_hh.data_mut(),
            self.b_h.data_mut(),
            self.w_hy.data_mut(),
            self.b_y.data_mut(),
        ]
    }

    pub(crate) fn trainable_sizes(&self) -> [usize; 5] {
        [
            self.w_xh.data().len(),
            self.w_hh.data().len(),
            self.b_h.data().len(),
            self.w_hy.data().len(),
            self.b_y.data().len(),
        ]
    }
}

/// Gradient buffers matching the trainable weights of `RnnWeights`.
#[derive(Debug, Clone)]
pub(crate) struct Gradients {
    pub w_xh: Vec<f32>,
    pub w_hh: Vec<f32>,
    pub b_h: Vec<f32>,
    pub w_hy: Vec<f32>,
    pub b_y: Vec<f32>,
}

impl Gradients {
    pub fn zeros(config: &RnnConfig) -> Self {
        let h = config.hidden_units;
        Gradients {
            w_xh: vec![0.0; h * config.embedding_dim],
            w_hh: vec![0.0; h * h],
            b_h: vec![0.0; h],
            w_hy: vec![0.0; config.vocab_size * h],
            b_y: vec![0.0; config.vocab_size],
        }
    }

    pub fn parts(&self) -> [&[f32]; 5] {
        [&self.w_xh, &self.w_hh, &self.b_h, &self.w_hy, &self.b_y]
    }

    fn parts_mut(&mut self) -> [&mut Vec<f32>; 5] {
        [
            &mut self.w_xh,
            &mut self.w_hh,
            &mut self.b_h,
            &mut self.w_hy,
            &mut self.b_y,
        ]
    }

    pub fn reset(&mut self) {
        for part in self.parts_mut() {
            part.iter_mut().for_each(|g| *g = 0.0);
        }
    }

    pub fn scale(&mut self, s: f32) {
        for part in self.parts_mut() {
            part.iter_mut().for_each(|g| *g *= s);
        }
    }

    /// Global L2 norm across all buffers.
    pub fn norm(&self) -> f32 {
        self.parts()
            .iter()
            .flat_map(|p| p.iter())
            .map(|g| g * g)
            .sum::<f32>()
            .sqrt()
    }

    /// Rescale so the global norm does not exceed `max_norm`.
    pub fn clip(&mut self, max_norm: f32) {
        let norm = self.norm();
        if norm > max_norm && norm.is_finite() && max_norm > 0.0 {
            self.scale(max_norm / norm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> RnnConfig {
        RnnConfig {
            vocab_size: 6,
            sequence_length: 3,
            embedding_dim: 2,
            hidden_units: 4,
        }
    }

    #[test]
    fn test_init_shapes() {
        let cfg = config();
        let mut rng = StdRng::seed_from_u64(1);
        let emb = Tensor::zeros(Shape::matrix(6, 2));
        let w = RnnWeights::init(&cfg, emb, &mut rng).unwrap();
        assert_eq!(w.w_hy.shape().dims(), &[6, 4]);
        assert_eq!(w.trainable_sizes(), [8, 16, 4, 24, 6]);
    }

    #[test]
    fn test_init_rejects_wrong_embedding() {
        let cfg = config();
        let mut rng = StdRng::seed_from_u64(1);
        let emb = Tensor::zeros(Shape::matrix(5, 2));
        assert!(RnnWeights::init(&cfg, emb, &mut rng).is_err());
    }

    #[test]
    fn test_gradient_clip() {
        let mut g = Gradients::zeros(&config());
        g.b_y[0] = 3.0;
        g.b_y[1] = 4.0;
        assert!((g.norm() - 5.0).abs() < 1e-6);
        g.clip(1.0);
        assert!((g.norm() - 1.0).abs() < 1e-5);
        g.reset();
        assert_eq!(g.norm(), 0.0);
    }
}
