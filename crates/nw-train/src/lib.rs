pub mod artifacts;
pub mod clean;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod pipeline;
pub mod settings;

pub use artifacts::{ArtifactConfig, ArtifactStore, LoadedArtifacts};
pub use clean::clean_text;
pub use error::{Result, TrainError};
pub use pipeline::{factory, CorpusPipeline};
pub use settings::PipelineSettings;
