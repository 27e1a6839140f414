use crate::sampler::{Sampler, TokenProb};

/// Added to every probability before taking its log.
pub const LOG_FLOOR: f32 = 1e-10;

/// Reshapes a probability distribution by a temperature.
///
/// Each probability becomes `exp(ln(p + 1e-10) / T)` and the result is
/// renormalised. Temperatures below 1 sharpen the distribution, above 1
/// flatten it. A temperature of exactly 1 leaves the input untouched.
pub struct TemperatureSampler {
    temperature: f32,
}

impl TemperatureSampler {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl Sampler for TemperatureSampler {
    fn apply(&self, probs: &mut Vec<TokenProb>) {
        if self.temperature == 1.0 || probs.is_empty() {
            return;
        }
        // Clamp temperature to a very small positive value if it is <= 0.
        let temp = if self.temperature <= 0.0 {
            1e-7
        } else {
            self.temperature
        };

        // Work in log space relative to the max so small temperatures
        // don't underflow every entry to zero.
        let logs: Vec<f32> = probs.iter().map(|t| (t.prob + LOG_FLOOR).ln() / temp).collect();
        let max = logs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0f32;
        for (token, log) in probs.iter_mut().zip(&logs) {
            token.prob = (log - max).exp();
            sum += token.prob;
        }
        if sum > 0.0 {
            for token in probs.iter_mut() {
                token.prob /= sum;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SamplerChain;
    use approx::assert_relative_eq;

    fn reshape(probs: &[f32], temperature: f32) -> Vec<f32> {
        SamplerChain::new()
            .with(Box::new(TemperatureSampler::new(temperature)))
            .reshape(probs)
            .into_iter()
            .map(|t| t.prob)
            .collect()
    }

    #[test]
    fn test_unit_temperature_is_exact_passthrough() {
        let probs = [0.1f32, 0.2, 0.3, 0.4 - 1e-9];
        let out = reshape(&probs, 1.0);
        for (a, b) in probs.iter().zip(&out) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_renormalised_across_range() {
        let probs = [0.05f32, 0.15, 0.3, 0.5, 0.0];
        for step in 1..=20 {
            let t = step as f32 * 0.1;
            let out = reshape(&probs, t);
            assert_relative_eq!(out.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
            assert!(out.iter().all(|p| p.is_finite() && *p >= 0.0));
        }
    }

    #[test]
    fn test_low_temperature_sharpens() {
        let probs = [0.2f32, 0.8];
        let out = reshape(&probs, 0.5);
        // 0.2^2 / (0.2^2 + 0.8^2)
        assert_relative_eq!(out[0], 0.04 / 0.68, epsilon = 1e-4);
        assert!(out[1] > 0.8);
    }

    #[test]
    fn test_high_temperature_flattens() {
        let probs = [0.1f32, 0.9];
        let out = reshape(&probs, 2.0);
        assert!(out[0] > 0.1 && out[1] < 0.9);
        assert!(out[1] > out[0]);
    }

    #[test]
    fn test_zero_probability_stays_negligible() {
        let out = reshape(&[0.0, 1.0], 0.1);
        assert!(out[0] < 1e-30);
    }
}
