use std::time::{Duration, Instant};

use nw_model::PAD_ID;
use nw_sampler::{SamplerChain, TemperatureSampler};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::registry::ModelSnapshot;

pub const MIN_WORDS: usize = 1;
pub const MAX_WORDS: usize = 100;
pub const MIN_TEMPERATURE: f32 = 0.1;
pub const MAX_TEMPERATURE: f32 = 2.0;

fn default_seed_text() -> String {
    "to be or not to".to_string()
}

fn default_num_words() -> usize {
    30
}

fn default_temperature() -> f32 {
    1.0
}

/// Parameters of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default = "default_seed_text")]
    pub seed_text: String,
    #[serde(default = "default_num_words")]
    pub num_words: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            seed_text: default_seed_text(),
            num_words: default_num_words(),
            temperature: default_temperature(),
        }
    }
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.seed_text.trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                "Seed text is required".to_string(),
            ));
        }
        if !(MIN_WORDS..=MAX_WORDS).contains(&self.num_words) {
            return Err(GenerationError::InvalidInput(format!(
                "Number of words must be between {MIN_WORDS} and {MAX_WORDS}"
            )));
        }
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(GenerationError::InvalidInput(format!(
                "Temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"
            )));
        }
        Ok(())
    }
}

/// Output of a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Lower-cased seed followed by the appended words.
    pub text: String,
    /// Words actually appended. Steps that drew the padding id add none.
    pub words_generated: usize,
    pub elapsed: Duration,
}

/// Keep the last `sequence_length` ids and left-pad with `PAD_ID` up to
/// exactly `sequence_length`.
pub fn context_window(ids: &[u32], sequence_length: usize) -> Vec<u32> {
    let tail = &ids[ids.len().saturating_sub(sequence_length)..];
    let mut window = vec![PAD_ID; sequence_length - tail.len()];
    window.extend_from_slice(tail);
    window
}

/// Autoregressive next-word generator.
///
/// Owns the process-wide random source every request draws from.
pub struct Generator {
    rng: Mutex<StdRng>,
}

impl Generator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Extend `request.seed_text` by `request.num_words` sampled words.
    pub fn generate(
        &self,
        snapshot: Option<&ModelSnapshot>,
        request: &GenerationRequest,
    ) -> Result<Generation, GenerationError> {
        let snapshot = snapshot.ok_or(GenerationError::ModelNotLoaded)?;
        request.validate()?;

        let started = Instant::now();
        let chain = SamplerChain::new().with(Box::new(TemperatureSampler::new(request.temperature)));
        let model = snapshot.model();
        let vocab = snapshot.vocabulary();

        let mut text = request.seed_text.to_lowercase();
        let mut words_generated = 0;

        for step in 0..request.num_words {
            let ids = vocab.encode(&text.to_lowercase());
            let window = context_window(&ids, snapshot.sequence_length());

            let probs = model
                .predict(&window)
                .map_err(|e| GenerationError::GenerationFailure(e.to_string()))?;
            if probs.len() != vocab.len() {
                return Err(GenerationError::GenerationFailure(format!(
                    "model returned {} probabilities for a vocabulary of {}",
                    probs.len(),
                    vocab.len()
                )));
            }

            let next = {
                let mut rng = self.rng.lock();
                chain.sample(&probs, &mut *rng)
            }
            .map_err(|e| GenerationError::GenerationFailure(e.to_string()))?;

            match vocab.token(next) {
                Some(word) => {
                    text.push(' ');
                    text.push_str(word);
                    words_generated += 1;
                }
                None => tracing::debug!(step, id = next, "sampled id has no token, skipping"),
            }
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            words = words_generated,
            elapsed_ms = elapsed.as_millis() as u64,
            "generation finished"
        );
        Ok(Generation {
            text,
            words_generated,
            elapsed,
        })
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{constant_snapshot, vocabulary, ConstantModel};
    use crate::registry::ModelMetadata;
    use nw_model::{LanguageModel, Vocabulary};
    use std::sync::Arc;

    fn request(seed: &str, num_words: usize, temperature: f32) -> GenerationRequest {
        GenerationRequest {
            seed_text: seed.to_string(),
            num_words,
            temperature,
        }
    }

    #[test]
    fn test_constant_model_repeats_token() {
        let snapshot = constant_snapshot("be", 4);
        let out = Generator::with_seed(1)
            .generate(Some(&snapshot), &request("to be or not to", 5, 1.0))
            .unwrap();
        assert_eq!(out.text, "to be or not to be be be be be");
        assert_eq!(out.words_generated, 5);
    }

    #[test]
    fn test_seed_is_lower_cased() {
        let snapshot = constant_snapshot("not", 2);
        let out = Generator::with_seed(1)
            .generate(Some(&snapshot), &request("To BE", 2, 0.5))
            .unwrap();
        assert_eq!(out.text, "to be not not");
    }

    #[test]
    fn test_word_count_bound() {
        // Uniform over every id including padding, so some steps skip.
        struct Uniform;
        impl LanguageModel for Uniform {
            fn predict(&self, _window: &[u32]) -> nw_model::Result<Vec<f32>> {
                Ok(vec![1.0 / 6.0; 6])
            }
            fn vocab_size(&self) -> usize {
                6
            }
            fn sequence_length(&self) -> usize {
                3
            }
            fn kind(&self) -> &str {
                "uniform"
            }
        }
        let snapshot = ModelSnapshot::new(
            Arc::new(Uniform),
            Arc::new(vocabulary()),
            3,
            ModelMetadata::default(),
        )
        .unwrap();
        let generator = Generator::with_seed(7);
        for n in [1, 10, 100] {
            let out = generator
                .generate(Some(&snapshot), &request("or", n, 1.3))
                .unwrap();
            let appended = out.text.split_whitespace().count() - 1;
            assert_eq!(appended, out.words_generated);
            assert!(appended <= n);
        }
    }

    #[test]
    fn test_padding_draw_is_skipped() {
        let vocab = vocabulary();
        let model = ConstantModel {
            target: PAD_ID,
            vocab_size: vocab.len(),
            sequence_length: 3,
        };
        let snapshot =
            ModelSnapshot::new(Arc::new(model), Arc::new(vocab), 3, ModelMetadata::default()).unwrap();
        let out = Generator::with_seed(0)
            .generate(Some(&snapshot), &request("to be", 4, 1.0))
            .unwrap();
        assert_eq!(out.text, "to be");
        assert_eq!(out.words_generated, 0);
    }

    #[test]
    fn test_model_not_loaded() {
        let err = Generator::with_seed(0)
            .generate(None, &request("", 0, 9.0))
            .unwrap_err();
        assert!(matches!(err, GenerationError::ModelNotLoaded));
    }

    #[test]
    fn test_input_validation() {
        let snapshot = constant_snapshot("be", 4);
        let generator = Generator::with_seed(0);
        for bad in [
            request("   ", 5, 1.0),
            request("to", 0, 1.0),
            request("to", 101, 1.0),
            request("to", 5, 0.05),
            request("to", 5, 2.5),
            request("to", 5, f32::NAN),
        ] {
            let err = generator.generate(Some(&snapshot), &bad).unwrap_err();
            assert_eq!(err.code(), "InvalidInput", "{bad:?}");
        }
        assert!(generator
            .generate(Some(&snapshot), &request("to", 100, 2.0))
            .is_ok());
    }

    #[test]
    fn test_model_error_is_generation_failure() {
        struct Broken;
        impl LanguageModel for Broken {
            fn predict(&self, _window: &[u32]) -> nw_model::Result<Vec<f32>> {
                Err(nw_model::ModelError::Other("boom".to_string()))
            }
            fn vocab_size(&self) -> usize {
                6
            }
            fn sequence_length(&self) -> usize {
                2
            }
            fn kind(&self) -> &str {
                "broken"
            }
        }
        let snapshot =
            ModelSnapshot::new(Arc::new(Broken), Arc::new(vocabulary()), 2, ModelMetadata::default())
                .unwrap();
        let err = Generator::with_seed(0)
            .generate(Some(&snapshot), &request("to", 3, 1.0))
            .unwrap_err();
        assert!(matches!(err, GenerationError::GenerationFailure(_)));
    }

    #[test]
    fn test_unknown_seed_words_use_oov() {
        let vocab = Vocabulary::from_words(["a".to_string()]).unwrap();
        let ids = vocab.encode("zzz a");
        assert_eq!(context_window(&ids, 4), vec![PAD_ID, PAD_ID, nw_model::OOV_ID, 2]);
    }

    #[test]
    fn test_context_window_left_pads() {
        let ids: Vec<u32> = (1..=5).collect();
        for len in 0..=5 {
            let window = context_window(&ids[..len], 5);
            assert_eq!(window.len(), 5);
            assert!(window[..5 - len].iter().all(|&id| id == PAD_ID));
            assert_eq!(&window[5 - len..], &ids[..len]);
        }
        assert_eq!(context_window(&ids, 3), vec![3, 4, 5]);
    }

    #[test]
    fn test_request_defaults() {
        let req: GenerationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, GenerationRequest::default());
        assert_eq!(req.num_words, 30);
    }
}
