use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::SampleError;
use crate::sampler::TokenProb;

/// Draw one token from `candidates`, weighting each by its probability.
///
/// Weights need not sum to one. Negative, non-finite or all-zero weights
/// are rejected.
pub fn draw<R: Rng + ?Sized>(candidates: &[TokenProb], rng: &mut R) -> Result<u32, SampleError> {
    if candidates.is_empty() {
        return Err(SampleError::Empty);
    }
    if let Some(bad) = candidates.iter().find(|c| !c.prob.is_finite()) {
        return Err(SampleError::InvalidWeights(format!(
            "token {} has weight {}",
            bad.token_id, bad.prob
        )));
    }
    let dist = WeightedIndex::new(candidates.iter().map(|c| c.prob))
        .map_err(|e| SampleError::InvalidWeights(e.to_string()))?;
    Ok(candidates[dist.sample(rng)].token_id)
}
