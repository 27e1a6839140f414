use thiserror::Error;

/// Why a generation request produced no text.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("generation failed: {0}")]
    GenerationFailure(String),
}

impl GenerationError {
    /// Stable tag for clients.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::ModelNotLoaded => "ModelNotLoaded",
            GenerationError::InvalidInput(_) => "InvalidInput",
            GenerationError::GenerationFailure(_) => "GenerationFailure",
        }
    }
}

/// Rejections from the training job's control surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Training is already in progress")]
    AlreadyRunning,

    #[error("No training in progress")]
    NotRunning,

    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error("training supervisor is gone")]
    SupervisorGone,

    #[error("{0}")]
    Spawn(String),
}

impl JobError {
    pub fn code(&self) -> &'static str {
        match self {
            JobError::AlreadyRunning => "AlreadyRunning",
            JobError::NotRunning => "NotRunning",
            JobError::InvalidConfig(_) => "InvalidConfig",
            JobError::SupervisorGone => "SupervisorGone",
            JobError::Spawn(_) => "Spawn",
        }
    }
}

/// Failure inside one phase of a training pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download failed: {0}")]
    Download(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("model error: {0}")]
    Model(#[from] nw_model::ModelError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{phase} called before its inputs were ready")]
    OutOfOrder { phase: &'static str },

    #[error("{0}")]
    Other(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
