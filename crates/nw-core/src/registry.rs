use std::fmt;
use std::sync::Arc;

use nw_model::{LanguageModel, ModelError, Vocabulary};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Descriptive facts about the served model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub embedding_type: String,
    pub embedding_dim: usize,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            model_type: "RNN".to_string(),
            embedding_type: "random".to_string(),
            embedding_dim: 0,
        }
    }
}

/// One immutable (model, vocabulary, sequence length) triple.
#[derive(Clone)]
pub struct ModelSnapshot {
    model: Arc<dyn LanguageModel>,
    vocabulary: Arc<Vocabulary>,
    sequence_length: usize,
    metadata: ModelMetadata,
}

impl ModelSnapshot {
    /// Pair a model with the vocabulary it was fit alongside.
    ///
    /// The model's output width must equal the vocabulary size and its
    /// window must equal `sequence_length`.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        vocabulary: Arc<Vocabulary>,
        sequence_length: usize,
        metadata: ModelMetadata,
    ) -> Result<ModelSnapshot, ModelError> {
        if model.vocab_size() != vocabulary.len() {
            return Err(ModelError::InvalidConfig(format!(
                "model emits {} ids but the vocabulary holds {}",
                model.vocab_size(),
                vocabulary.len()
            )));
        }
        if model.sequence_length() != sequence_length {
            return Err(ModelError::WindowLength {
                expected: sequence_length,
                got: model.sequence_length(),
            });
        }
        Ok(ModelSnapshot {
            model,
            vocabulary,
            sequence_length,
            metadata,
        })
    }

    pub fn model(&self) -> &dyn LanguageModel {
        self.model.as_ref()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

impl fmt::Debug for ModelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSnapshot")
            .field("kind", &self.model.kind())
            .field("vocab_size", &self.vocabulary.len())
            .field("sequence_length", &self.sequence_length)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Read view of the registry for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub vocab_size: usize,
    pub sequence_length: usize,
    pub model_type: String,
    pub embedding_type: String,
    pub embedding_dim: usize,
}

/// Holds the single active model snapshot.
///
/// Readers clone the `Arc` under a short read lock and keep using their
/// snapshot even if training installs a new one meanwhile.
#[derive(Debug)]
pub struct ModelRegistry {
    slot: RwLock<Option<Arc<ModelSnapshot>>>,
    /// Reported while the slot is empty.
    default_sequence_length: usize,
}

impl ModelRegistry {
    pub fn new(default_sequence_length: usize) -> Self {
        Self {
            slot: RwLock::new(None),
            default_sequence_length,
        }
    }

    pub fn get(&self) -> Option<Arc<ModelSnapshot>> {
        self.slot.read().clone()
    }

    /// Replace the active snapshot.
    pub fn set(&self, snapshot: ModelSnapshot) {
        let snapshot = Arc::new(snapshot);
        tracing::info!(
            vocab_size = snapshot.vocabulary().len(),
            sequence_length = snapshot.sequence_length(),
            model_type = %snapshot.metadata().model_type,
            "model registry updated"
        );
        *self.slot.write() = Some(snapshot);
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    pub fn status(&self) -> ModelStatus {
        match self.get() {
            Some(snapshot) => ModelStatus {
                model_loaded: true,
                vocab_size: snapshot.vocabulary().len(),
                sequence_length: snapshot.sequence_length(),
                model_type: snapshot.metadata().model_type.clone(),
                embedding_type: snapshot.metadata().embedding_type.clone(),
                embedding_dim: snapshot.metadata().embedding_dim,
            },
            None => {
                let metadata = ModelMetadata::default();
                ModelStatus {
                    model_loaded: false,
                    vocab_size: 0,
                    sequence_length: self.default_sequence_length,
                    model_type: metadata.model_type,
                    embedding_type: metadata.embedding_type,
                    embedding_dim: metadata.embedding_dim,
                }
            }
        }
    }
}
