use std::path::PathBuf;

use nw_core::TrainingConfig;
use nw_model::FitOptions;
use serde::{Deserialize, Serialize};

pub const SHAKESPEARE_URL: &str =
    "https://storage.googleapis.com/download.tensorflow.org/data/shakespeare.txt";

/// Process-wide pipeline settings. Per-job hyperparameters live in
/// `TrainingConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub sequence_length: usize,
    /// Cap on vocabulary ids, padding and `<OOV>` included.
    pub max_vocab_size: usize,
    pub validation_split: f32,
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    /// `http(s)://` URL or a local file path.
    pub corpus_url: String,
    /// Cached corpus file name inside `data_dir`.
    pub corpus_file: String,
    /// Embedding files tried in order; relative paths resolve against
    /// `data_dir` first, then the working directory.
    pub embedding_paths: Vec<PathBuf>,
    pub early_stopping_patience: Option<usize>,
    pub plateau_patience: Option<usize>,
    pub plateau_factor: f32,
    pub min_learning_rate: f32,
    pub clip_norm: f32,
    pub seed: u64,
    /// Keep at most this many training samples (taken from the start of
    /// the corpus). `None` uses every sample.
    pub max_samples: Option<usize>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sequence_length: 50,
            max_vocab_size: 10_000,
            validation_split: 0.2,
            data_dir: PathBuf::from("data"),
            model_dir: PathBuf::from("saved_models"),
            corpus_url: SHAKESPEARE_URL.to_string(),
            corpus_file: "shakespeare.txt".to_string(),
            embedding_paths: [
                "glove.2024.dolma.300d/dolma_300_2024_1.2M.100_combined.txt",
                "dolma_300_2024_1.2M.100_combined.txt",
                "glove/glove.6B.300d.txt",
                "glove.6B.300d.txt",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            early_stopping_patience: Some(5),
            plateau_patience: Some(2),
            plateau_factor: 0.5,
            min_learning_rate: 1e-5,
            clip_norm: 5.0,
            seed: 42,
            max_samples: None,
        }
    }
}

impl PipelineSettings {
    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join(&self.corpus_file)
    }

    /// Candidate embedding files in lookup order.
    pub fn embedding_candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(self.embedding_paths.len() * 2);
        for path in &self.embedding_paths {
            if path.is_relative() {
                out.push(self.data_dir.join(path));
            }
            out.push(path.clone());
        }
        out
    }

    pub fn fit_options(&self, config: &TrainingConfig) -> FitOptions {
        FitOptions {
            epochs: config.epochs,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            validation_split: self.validation_split,
            early_stopping_patience: self.early_stopping_patience,
            plateau_patience: self.plateau_patience,
            plateau_factor: self.plateau_factor,
            min_learning_rate: self.min_learning_rate,
            clip_norm: self.clip_norm,
            seed: self.seed,
        }
    }
}
