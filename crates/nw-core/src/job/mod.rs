//! Single-flight, cancellable background training.
//!
//! `TrainingJob` is a handle onto a supervisor thread. Start and stop
//! requests travel to it as messages; it spawns one worker thread per
//! accepted job. Status reads go straight to the shared status board and
//! never wait on the worker.

mod cancel;
mod phase;
mod pipeline;
mod progress;
mod record;
mod supervisor;

pub use phase::JobPhase;
pub use pipeline::{PhaseContext, PipelineFactory, TrainingConfig, TrainingPipeline};
pub use record::{JobSnapshot, LOG_VIEW};

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use record::StatusBoard;
use supervisor::{Command, Supervisor};

use crate::error::JobError;
use crate::registry::ModelRegistry;

pub struct TrainingJob {
    commands: Sender<Command>,
    board: Arc<StatusBoard>,
}

impl TrainingJob {
    /// Spawn the supervisor. Completed jobs install their model in
    /// `registry`; `factory` builds the pipeline for each accepted job.
    pub fn spawn(registry: Arc<ModelRegistry>, factory: PipelineFactory) -> std::io::Result<TrainingJob> {
        let board = Arc::new(StatusBoard::new());
        let (commands, inbox) = mpsc::channel();
        let supervisor = Supervisor {
            board: Arc::clone(&board),
            registry,
            factory,
            current: None,
        };
        thread::Builder::new()
            .name("nw-training-supervisor".to_string())
            .spawn(move || supervisor.run(inbox))?;
        Ok(TrainingJob { commands, board })
    }

    /// Begin a job unless one is already running. Returns the accepted
    /// config; the job itself runs in the background.
    pub fn start(&self, config: TrainingConfig) -> Result<TrainingConfig, JobError> {
        let (reply, answer) = mpsc::channel();
        self.commands
            .send(Command::Start { config, reply })
            .map_err(|_| JobError::SupervisorGone)?;
        answer.recv().map_err(|_| JobError::SupervisorGone)?
    }

    /// Ask the running job to stop at its next checkpoint.
    pub fn request_stop(&self) -> Result<(), JobError> {
        let (reply, answer) = mpsc::channel();
        self.commands
            .send(Command::Stop { reply })
            .map_err(|_| JobError::SupervisorGone)?;
        answer.recv().map_err(|_| JobError::SupervisorGone)?
    }

    pub fn status(&self) -> JobSnapshot {
        self.board.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.board.is_training()
    }

    /// Every log line from index `offset` onwards.
    pub fn logs_since(&self, offset: usize) -> Vec<String> {
        self.board.logs_since(offset)
    }
}
