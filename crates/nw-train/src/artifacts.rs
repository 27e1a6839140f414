use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nw_core::{ModelMetadata, ModelSnapshot};
use nw_model::{FitHistory, RecurrentModel, Vocabulary};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

pub const MODEL_FILE: &str = "final_model.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";
pub const HISTORY_FILE: &str = "history.json";

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub vocab_size: usize,
    pub sequence_length: usize,
    pub embedding_dim: usize,
    pub lstm_units: usize,
    pub epochs_run: usize,
    pub final_loss: Option<f32>,
    pub final_val_loss: Option<f32>,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub embedding_type: String,
    pub timestamp: DateTime<Utc>,
}

fn default_model_type() -> String {
    "RNN".to_string()
}

impl ArtifactConfig {
    pub fn describe(model: &RecurrentModel, history: &FitHistory, embedding_type: &str) -> Self {
        let cfg = model.config();
        let last = history.last();
        ArtifactConfig {
            vocab_size: cfg.vocab_size,
            sequence_length: cfg.sequence_length,
            embedding_dim: cfg.embedding_dim,
            lstm_units: cfg.hidden_units,
            epochs_run: history.epochs.len(),
            final_loss: last.map(|m| m.loss),
            final_val_loss: last.and_then(|m| m.val_loss),
            model_type: default_model_type(),
            embedding_type: embedding_type.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            model_type: self.model_type.clone(),
            embedding_type: self.embedding_type.clone(),
            embedding_dim: self.embedding_dim,
        }
    }
}

/// A model read back from disk.
#[derive(Debug)]
pub struct LoadedArtifacts {
    pub model: RecurrentModel,
    pub vocabulary: Vocabulary,
    pub config: ArtifactConfig,
}

impl LoadedArtifacts {
    pub fn into_snapshot(self) -> Result<ModelSnapshot> {
        let sequence_length = self.model.config().sequence_length;
        let metadata = self.config.metadata();
        Ok(ModelSnapshot::new(
            Arc::new(self.model),
            Arc::new(self.vocabulary),
            sequence_length,
            metadata,
        )?)
    }
}

/// The model directory and the files in it.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// True when both the weights and the vocabulary are present.
    pub fn exists(&self) -> bool {
        self.path(MODEL_FILE).is_file() && self.path(TOKENIZER_FILE).is_file()
    }

    /// Write all four artifacts.
    pub fn save(
        &self,
        model: &RecurrentModel,
        vocabulary: &Vocabulary,
        config: &ArtifactConfig,
        history: &FitHistory,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_json(&self.path(MODEL_FILE), model)?;
        write_json(&self.path(TOKENIZER_FILE), vocabulary)?;
        write_json(&self.path(CONFIG_FILE), config)?;
        write_json(&self.path(HISTORY_FILE), history)?;
        tracing::info!(dir = %self.dir.display(), "artifacts saved");
        Ok(())
    }

    /// Read the saved model back, checking that its parts agree.
    pub fn load(&self) -> Result<LoadedArtifacts> {
        let model: RecurrentModel = read_json(&self.path(MODEL_FILE))?;
        model.validate()?;
        let vocabulary: Vocabulary = read_json(&self.path(TOKENIZER_FILE))?;

        let config = match read_json::<ArtifactConfig>(&self.path(CONFIG_FILE)) {
            Ok(config) => config,
            Err(TrainError::MissingArtifact(path)) => {
                tracing::warn!(path = %path.display(), "no config artifact, deriving metadata");
                ArtifactConfig::describe(&model, &FitHistory::default(), "unknown")
            }
            Err(e) => return Err(e),
        };

        if vocabulary.len() != model.config().vocab_size {
            return Err(TrainError::Msg(format!(
                "tokenizer has {} ids but the model emits {}",
                vocabulary.len(),
                model.config().vocab_size
            )));
        }
        Ok(LoadedArtifacts {
            model,
            vocabulary,
            config,
        })
    }

    pub fn load_history(&self) -> Result<FitHistory> {
        read_json(&self.path(HISTORY_FILE))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut out = BufWriter::new(fs::File::create(&tmp)?);
    serde_json::to_writer(&mut out, value)?;
    out.flush()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(TrainError::MissingArtifact(path.to_path_buf()));
    }
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nw_model::{EpochMetrics, LanguageModel, RnnConfig};
    use nw_tensor::{Shape, Tensor};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> (RecurrentModel, Vocabulary, FitHistory) {
        let vocab = Vocabulary::from_words(["to", "be", "or", "not"].map(String::from)).unwrap();
        let config = RnnConfig {
            vocab_size: vocab.len(),
            sequence_length: 3,
            embedding_dim: 4,
            hidden_units: 5,
        };
        let mut rng = StdRng::seed_from_u64(11);
        let embedding = Tensor::uniform(Shape::matrix(vocab.len(), 4), 0.1, &mut rng);
        let model = RecurrentModel::new(config, embedding, &mut rng).unwrap();
        let history = FitHistory {
            epochs: vec![EpochMetrics {
                epoch: 1,
                total_epochs: 1,
                loss: 1.5,
                accuracy: 0.2,
                val_loss: Some(1.7),
                val_accuracy: Some(0.1),
                learning_rate: 0.001,
            }],
            ..FitHistory::default()
        };
        (model, vocab, history)
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("models"));
        let (model, vocab, history) = fixture();
        let config = ArtifactConfig::describe(&model, &history, "random");
        assert!(!store.exists());

        store.save(&model, &vocab, &config, &history).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.vocabulary, vocab);
        assert_eq!(loaded.config.final_val_loss, Some(1.7));
        assert_eq!(loaded.config.epochs_run, 1);
        let window = [0, 2, 3];
        assert_eq!(
            loaded.model.predict(&window).unwrap(),
            model.predict(&window).unwrap()
        );
        assert_eq!(store.load_history().unwrap(), history);

        let snapshot = loaded.into_snapshot().unwrap();
        assert_eq!(snapshot.sequence_length(), 3);
        assert_eq!(snapshot.metadata().embedding_type, "random");
    }

    #[test]
    fn test_missing_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, TrainError::MissingArtifact(p) if p.ends_with(MODEL_FILE)));
    }

    #[test]
    fn test_missing_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (model, vocab, history) = fixture();
        let config = ArtifactConfig::describe(&model, &history, "random");
        store.save(&model, &vocab, &config, &history).unwrap();
        fs::remove_file(dir.path().join(CONFIG_FILE)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.config.embedding_type, "unknown");
        assert_eq!(loaded.config.vocab_size, vocab.len());
    }

    #[test]
    fn test_mismatched_tokenizer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (model, _, history) = fixture();
        let other = Vocabulary::from_words(["a".to_string()]).unwrap();
        let config = ArtifactConfig::describe(&model, &history, "random");
        store.save(&model, &other, &config, &history).unwrap();
        assert!(matches!(store.load(), Err(TrainError::Msg(_))));
    }
}
