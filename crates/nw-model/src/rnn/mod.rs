mod adam;
mod backprop;
pub mod config;
pub mod fit;
pub mod weights;

pub use config::RnnConfig;
pub use fit::{fit, Dataset, EpochControl, EpochMetrics, EpochObserver, FitHistory, FitOptions};
pub use weights::RnnWeights;

use std::sync::Arc;

use nw_tensor::{ComputeBackend, CpuBackend, Tensor};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::architecture::LanguageModel;
use crate::error::{ModelError, Result};
use crate::tokenizer::vocab::PAD_ID;

fn default_backend() -> Arc<dyn ComputeBackend> {
    Arc::new(CpuBackend::new())
}

/// Single-layer recurrent next-word model.
///
/// A window of token ids is embedded through a frozen lookup table, folded
/// through a tanh recurrent layer, and the final hidden state is projected
/// to a softmax over the vocabulary. Padding ids are masked: they leave the
/// hidden state untouched, so left-padded windows behave like shorter ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrentModel {
    config: RnnConfig,
    weights: RnnWeights,
    #[serde(skip, default = "default_backend")]
    backend: Arc<dyn ComputeBackend>,
}

/// Intermediate values of one forward pass, kept for backpropagation.
#[derive(Debug, Clone)]
pub(crate) struct ForwardTrace {
    /// Token id consumed at each step, `None` for masked padding.
    pub steps: Vec<Option<u32>>,
    /// Hidden states h_0..=h_T (h_0 is the zero state).
    pub hidden: Vec<Vec<f32>>,
    /// Output distribution.
    pub probs: Vec<f32>,
}

impl ForwardTrace {
    /// Id of the most probable outcome.
    pub fn predicted(&self) -> u32 {
        self.probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i as u32)
            .unwrap_or(PAD_ID)
    }
}

impl RecurrentModel {
    /// Build a fresh model around `embedding` ([vocab_size, embedding_dim]).
    pub fn new<R: Rng + ?Sized>(
        config: RnnConfig,
        embedding: Tensor,
        rng: &mut R,
    ) -> Result<RecurrentModel> {
        config.validate()?;
        let weights = RnnWeights::init(&config, embedding, rng)?;
        Ok(RecurrentModel {
            config,
            weights,
            backend: default_backend(),
        })
    }

    /// Assemble a model from existing weights, checking every shape.
    pub fn from_parts(config: RnnConfig, weights: RnnWeights) -> Result<RecurrentModel> {
        let model = RecurrentModel {
            config,
            weights,
            backend: default_backend(),
        };
        model.validate()?;
        Ok(model)
    }

    /// Checks config and weight shapes. Deserialized models must pass this
    /// before they are served.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        self.weights.check(&self.config)
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn weights(&self) -> &RnnWeights {
        &self.weights
    }

    pub(crate) fn forward_trace(&self, window: &[u32]) -> Result<ForwardTrace> {
        let cfg = &self.config;
        if window.len() != cfg.sequence_length {
            return Err(ModelError::WindowLength {
                expected: cfg.sequence_length,
                got: window.len(),
            });
        }

        let backend = self.backend.as_ref();
        let w = &self.weights;

        let mut h = vec![0.0f32; cfg.hidden_units];
        let mut hidden = Vec::with_capacity(window.len() + 1);
        let mut steps = Vec::with_capacity(window.len());
        hidden.push(h.clone());

        for &id in window {
            if id as usize >= cfg.vocab_size {
                return Err(ModelError::TokenOutOfRange {
                    id,
                    vocab_size: cfg.vocab_size,
                });
            }
            if id == PAD_ID {
                steps.push(None);
                hidden.push(h.clone());
                continue;
            }

            // h_t = tanh(W_xh x_t + W_hh h_{t-1} + b_h)
            let x = w.embedding.row(id as usize)?;
            let input = w.w_xh.matvec(x, backend)?;
            let recurrent = w.w_hh.matvec(&h, backend)?;
            let pre = backend.add(&backend.add(&input, &recurrent)?, w.b_h.data())?;
            h = backend.tanh(&pre)?;

            steps.push(Some(id));
            hidden.push(h.clone());
        }

        let logits = backend.add(&w.w_hy.matvec(&h, backend)?, w.b_y.data())?;
        let probs = backend.softmax(&logits, cfg.vocab_size)?;

        Ok(ForwardTrace {
            steps,
            hidden,
            probs,
        })
    }

    /// Mean cross-entropy loss and accuracy over `data`.
    pub fn evaluate(&self, data: &Dataset) -> Result<(f32, f32)> {
        if data.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        for (window, target) in data.iter() {
            let trace = self.forward_trace(window)?;
            loss_sum += backprop::cross_entropy(&trace.probs, target) as f64;
            if trace.predicted() == target {
                correct += 1;
            }
        }
        let n = data.len();
        Ok(((loss_sum / n as f64) as f32, correct as f32 / n as f32))
    }
}

impl LanguageModel for RecurrentModel {
    fn predict(&self, window: &[u32]) -> Result<Vec<f32>> {
        Ok(self.forward_trace(window)?.probs)
    }

    fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    fn sequence_length(&self) -> usize {
        self.config.sequence_length
    }

    fn kind(&self) -> &str {
        "RNN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nw_tensor::Shape;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn tiny_model(seed: u64) -> RecurrentModel {
        let config = RnnConfig {
            vocab_size: 6,
            sequence_length: 3,
            embedding_dim: 4,
            hidden_units: 5,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let embedding = Tensor::uniform(Shape::matrix(6, 4), 0.5, &mut rng);
        RecurrentModel::new(config, embedding, &mut rng).unwrap()
    }

    #[test]
    fn test_predict_is_distribution() {
        let model = tiny_model(3);
        let probs = model.predict(&[2, 3, 4]).unwrap();
        assert_eq!(probs.len(), 6);
        assert_relative_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert!(probs.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn test_padding_is_masked() {
        let model = tiny_model(3);
        let padded = model.predict(&[PAD_ID, PAD_ID, 4]).unwrap();
        let short = model.forward_trace(&[PAD_ID, 4, PAD_ID]).unwrap();
        // A single real token yields the same final state wherever the
        // padding sits around it.
        assert_eq!(padded, short.probs);
        assert_eq!(short.steps, vec![None, Some(4), None]);
    }

    #[test]
    fn test_rejects_wrong_window() {
        let model = tiny_model(3);
        assert!(matches!(
            model.predict(&[1, 2]),
            Err(ModelError::WindowLength { expected: 3, got: 2 })
        ));
        assert!(matches!(
            model.predict(&[1, 2, 9]),
            Err(ModelError::TokenOutOfRange { id: 9, vocab_size: 6 })
        ));
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let model = tiny_model(5);
        let json = serde_json::to_string(&model).unwrap();
        let back: RecurrentModel = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(
            model.predict(&[1, 2, 3]).unwrap(),
            back.predict(&[1, 2, 3]).unwrap()
        );
    }

    #[test]
    fn test_from_parts_checks_shapes() {
        let model = tiny_model(5);
        let mut config = model.config().clone();
        config.hidden_units = 7;
        assert!(RecurrentModel::from_parts(config, model.weights().clone()).is_err());
    }

    #[test]
    fn test_kind_and_sizes() {
        let model = tiny_model(1);
        assert_eq!(model.kind(), "RNN");
        assert_eq!(model.vocab_size(), 6);
        assert_eq!(model.sequence_length(), 3);
    }
}
