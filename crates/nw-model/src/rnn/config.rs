use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Hyperparameters of a `RecurrentModel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnnConfig {
    /// Output width, padding id included.
    pub vocab_size: usize,
    /// Window length consumed per forward pass.
    pub sequence_length: usize,
    /// Width of the (frozen) token embeddings.
    pub embedding_dim: usize,
    /// Width of the recurrent hidden state.
    pub hidden_units: usize,
}

impl RnnConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size < 2 {
            return Err(ModelError::InvalidConfig(format!(
                "vocab_size must be at least 2, got {}",
                self.vocab_size
            )));
        }
        for (name, value) in [
            ("sequence_length", self.sequence_length),
            ("embedding_dim", self.embedding_dim),
            ("hidden_units", self.hidden_units),
        ] {
            if value == 0 {
                return Err(ModelError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}
