use std::path::PathBuf;

use nw_core::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Net(#[from] reqwest::Error),

    #[error("download failed: {0}")]
    Download(String),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(#[from] nw_model::ModelError),

    #[error("tensor error: {0}")]
    Tensor(#[from] nw_tensor::TensorError),

    #[error("missing artifact {0}")]
    MissingArtifact(PathBuf),

    #[error("{0}")]
    Msg(String),
}

pub type Result<T> = std::result::Result<T, TrainError>;

impl From<TrainError> for PipelineError {
    fn from(e: TrainError) -> Self {
        match e {
            TrainError::Io(e) => PipelineError::Io(e),
            TrainError::Net(e) => PipelineError::Download(e.to_string()),
            TrainError::Download(msg) => PipelineError::Download(msg),
            TrainError::Serde(e) => PipelineError::Serialization(e),
            TrainError::Model(e) => PipelineError::Model(e),
            other => PipelineError::Other(other.to_string()),
        }
    }
}
