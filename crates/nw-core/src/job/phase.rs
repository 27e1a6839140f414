use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a training job.
///
/// `Completed`, `Failed` and `Stopped` are terminal for a run; a new start
/// resets the record to `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Idle,
    Starting,
    Preparing,
    Downloading,
    Preprocessing,
    LoadingEmbeddings,
    BuildingModel,
    Training,
    Saving,
    Completed,
    Failed,
    Stopped,
}

impl JobPhase {
    /// True while a job occupies the single training slot.
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            JobPhase::Idle | JobPhase::Completed | JobPhase::Failed | JobPhase::Stopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Starting => "starting",
            JobPhase::Preparing => "preparing",
            JobPhase::Downloading => "downloading",
            JobPhase::Preprocessing => "preprocessing",
            JobPhase::LoadingEmbeddings => "loading_embeddings",
            JobPhase::BuildingModel => "building_model",
            JobPhase::Training => "training",
            JobPhase::Saving => "saving",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
            JobPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
