pub mod error;
pub mod generate;
pub mod job;
pub mod registry;

pub use error::{GenerationError, JobError, PipelineError, PipelineResult};
pub use generate::{Generation, GenerationRequest, Generator};
pub use job::{
    JobPhase, JobSnapshot, PhaseContext, PipelineFactory, TrainingConfig, TrainingJob,
    TrainingPipeline, LOG_VIEW,
};
pub use registry::{ModelMetadata, ModelRegistry, ModelSnapshot, ModelStatus};
