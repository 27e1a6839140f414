use std::sync::Arc;

use nw_model::{EpochObserver, FitHistory};
use serde::{Deserialize, Serialize};

use super::cancel::CancelToken;
use super::record::StatusBoard;
use crate::error::{JobError, PipelineResult};
use crate::registry::ModelSnapshot;

/// User-facing training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Width of the recurrent layer.
    #[serde(alias = "hidden_units")]
    pub lstm_units: usize,
    pub embedding_dim: usize,
    pub learning_rate: f32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 128,
            lstm_units: 256,
            embedding_dim: 300,
            learning_rate: 0.001,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), JobError> {
        for (name, value) in [
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("lstm_units", self.lstm_units),
            ("embedding_dim", self.embedding_dim),
        ] {
            if value == 0 {
                return Err(JobError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(JobError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// What a pipeline phase can see of the job driving it.
pub struct PhaseContext<'a> {
    config: &'a TrainingConfig,
    board: &'a StatusBoard,
    cancel: &'a CancelToken,
}

impl<'a> PhaseContext<'a> {
    pub(crate) fn new(config: &'a TrainingConfig, board: &'a StatusBoard, cancel: &'a CancelToken) -> Self {
        Self {
            config,
            board,
            cancel,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        self.config
    }

    /// Append a line to the job log.
    pub fn log(&self, line: impl Into<String>) {
        self.board.log(line);
    }

    /// True once a stop was requested. Long phases may poll this.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_requested()
    }
}

/// The ordered steps of one training run.
///
/// The job calls each method once, in declaration order, and checks for
/// cancellation between them. Any error ends the run as `failed`.
pub trait TrainingPipeline: Send {
    /// Create working directories and similar.
    fn prepare(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()>;

    /// Fetch (or locate) the raw corpus.
    fn download(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()>;

    /// Clean the corpus, fit the vocabulary and build training sequences.
    fn preprocess(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()>;

    /// Build the embedding matrix for the fitted vocabulary.
    fn load_embeddings(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()>;

    fn build_model(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()>;

    /// Fit the model, reporting every epoch to `observer`.
    fn train(
        &mut self,
        ctx: &PhaseContext<'_>,
        observer: &mut dyn EpochObserver,
    ) -> PipelineResult<FitHistory>;

    /// Persist artifacts and hand back the snapshot to serve.
    fn save(&mut self, ctx: &PhaseContext<'_>, history: &FitHistory) -> PipelineResult<ModelSnapshot>;
}

/// Builds a fresh pipeline for each accepted job.
pub type PipelineFactory =
    Arc<dyn Fn(&TrainingConfig) -> PipelineResult<Box<dyn TrainingPipeline>> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: TrainingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TrainingConfig::default());
        assert_eq!(config.epochs, 50);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.lstm_units, 256);
        assert_eq!(config.embedding_dim, 300);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_body_and_alias() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"epochs": 3, "hidden_units": 32}"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.lstm_units, 32);
        assert_eq!(config.batch_size, 128);
    }

    #[test]
    fn test_validate_rejects_zero_and_bad_rate() {
        let zero = TrainingConfig {
            batch_size: 0,
            ..TrainingConfig::default()
        };
        assert!(matches!(zero.validate(), Err(JobError::InvalidConfig(_))));

        let rate = TrainingConfig {
            learning_rate: f32::NAN,
            ..TrainingConfig::default()
        };
        assert!(matches!(rate.validate(), Err(JobError::InvalidConfig(_))));
    }
}
