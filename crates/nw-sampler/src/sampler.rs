use rand::Rng;

use crate::categorical;
use crate::error::SampleError;

/// A token ID paired with its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenProb {
    pub token_id: u32,
    pub prob: f32,
}

/// Trait for stages that reshape a candidate distribution before the draw.
pub trait Sampler: Send + Sync {
    /// Modify probabilities in-place.
    fn apply(&self, probs: &mut Vec<TokenProb>);
}

/// Composes reshaping stages and ends with a categorical draw.
#[derive(Default)]
pub struct SamplerChain {
    samplers: Vec<Box<dyn Sampler>>,
}

impl SamplerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sampler to the end of the chain. Returns self for builder-style usage.
    pub fn with(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.samplers.push(sampler);
        self
    }

    /// Run every stage over `probs` (token_id = index) and return the result.
    pub fn reshape(&self, probs: &[f32]) -> Vec<TokenProb> {
        let mut candidates: Vec<TokenProb> = probs
            .iter()
            .enumerate()
            .map(|(i, &prob)| TokenProb {
                token_id: i as u32,
                prob,
            })
            .collect();

        for sampler in &self.samplers {
            sampler.apply(&mut candidates);
        }
        candidates
    }

    /// Reshape `probs`, then draw one token id from the result.
    pub fn sample<R: Rng + ?Sized>(&self, probs: &[f32], rng: &mut R) -> Result<u32, SampleError> {
        let candidates = self.reshape(probs);
        categorical::draw(&candidates, rng)
    }
}
