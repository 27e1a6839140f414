use std::sync::Arc;

use nw_core::{Generator, ModelRegistry, TrainingJob};

/// Shared by every handler.
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub generator: Arc<Generator>,
    pub job: TrainingJob,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, generator: Generator, job: TrainingJob) -> Arc<Self> {
        Arc::new(Self {
            registry,
            generator: Arc::new(generator),
            job,
        })
    }
}
