use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;

use chrono::Utc;

use super::cancel::CancelToken;
use super::phase::JobPhase;
use super::pipeline::{PhaseContext, PipelineFactory, TrainingConfig};
use super::progress::ProgressObserver;
use super::record::StatusBoard;
use crate::error::{JobError, PipelineResult};
use crate::registry::ModelRegistry;

pub(crate) enum Command {
    Start {
        config: TrainingConfig,
        reply: Sender<Result<TrainingConfig, JobError>>,
    },
    Stop {
        reply: Sender<Result<(), JobError>>,
    },
}

/// Owns the single-flight decision: every start and stop passes through
/// this loop, one at a time.
pub(crate) struct Supervisor {
    pub board: Arc<StatusBoard>,
    pub registry: Arc<ModelRegistry>,
    pub factory: PipelineFactory,
    /// Cancellation token of the most recently started job.
    pub current: Option<Arc<CancelToken>>,
}

impl Supervisor {
    pub fn run(mut self, commands: Receiver<Command>) {
        while let Ok(command) = commands.recv() {
            match command {
                Command::Start { config, reply } => {
                    let _ = reply.send(self.start(config));
                }
                Command::Stop { reply } => {
                    let _ = reply.send(self.stop());
                }
            }
        }
        tracing::debug!("training supervisor exiting");
    }

    fn start(&mut self, config: TrainingConfig) -> Result<TrainingConfig, JobError> {
        if self.board.is_training() {
            return Err(JobError::AlreadyRunning);
        }
        config.validate()?;

        let cancel = Arc::new(CancelToken::new());
        self.board.reset(&config);
        self.current = Some(Arc::clone(&cancel));

        let worker = Worker {
            board: Arc::clone(&self.board),
            registry: Arc::clone(&self.registry),
            factory: Arc::clone(&self.factory),
            cancel,
            config: config.clone(),
        };
        let spawned = thread::Builder::new()
            .name("nw-training".to_string())
            .spawn(move || worker.run());
        if let Err(e) = spawned {
            let message = format!("could not spawn training thread: {e}");
            self.board.log(format!("Error: {message}"));
            self.board.update(|r| {
                r.phase = JobPhase::Failed;
                r.is_training = false;
                r.error = Some(message.clone());
                r.finished_at = Some(Utc::now());
            });
            return Err(JobError::Spawn(message));
        }

        tracing::info!(
            epochs = config.epochs,
            batch_size = config.batch_size,
            lstm_units = config.lstm_units,
            "training job accepted"
        );
        Ok(config)
    }

    fn stop(&mut self) -> Result<(), JobError> {
        if !self.board.is_training() {
            return Err(JobError::NotRunning);
        }
        // A worker past its commit point finishes as `completed`.
        if let Some(cancel) = &self.current {
            if !cancel.request() {
                return Err(JobError::NotRunning);
            }
        }
        self.board.log("Stop signal received...");
        Ok(())
    }
}

enum Outcome {
    Completed,
    Stopped,
}

struct Worker {
    board: Arc<StatusBoard>,
    registry: Arc<ModelRegistry>,
    factory: PipelineFactory,
    cancel: Arc<CancelToken>,
    config: TrainingConfig,
}

impl Worker {
    fn run(self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.drive()));

        let (phase, error) = match result {
            Ok(Ok(Outcome::Completed)) => (JobPhase::Completed, None),
            Ok(Ok(Outcome::Stopped)) => (JobPhase::Stopped, None),
            Ok(Err(e)) => (JobPhase::Failed, Some(e.to_string())),
            Err(payload) => (JobPhase::Failed, Some(format!("panic: {}", panic_message(&*payload)))),
        };

        match (&phase, &error) {
            (JobPhase::Completed, _) => self.board.log("Training completed successfully!"),
            (JobPhase::Stopped, _) => self.board.log("Training stopped"),
            (_, Some(message)) => {
                tracing::error!(error = %message, "training job failed");
                self.board.log(format!("Error: {message}"));
            }
            _ => {}
        }

        self.board.update(|r| {
            r.phase = phase;
            if phase == JobPhase::Completed {
                r.progress = 100.0;
            }
            r.error = error;
            r.is_training = false;
            r.finished_at = Some(Utc::now());
        });
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_requested()
    }

    fn drive(&self) -> PipelineResult<Outcome> {
        if self.cancelled() {
            return Ok(Outcome::Stopped);
        }
        let board = self.board.as_ref();
        let ctx = PhaseContext::new(&self.config, board, &self.cancel);
        let mut pipeline = (self.factory)(&self.config)?;

        board.enter(JobPhase::Preparing, "Initializing training...");
        pipeline.prepare(&ctx)?;
        if self.cancelled() {
            return Ok(Outcome::Stopped);
        }

        board.enter(JobPhase::Downloading, "Downloading dataset...");
        pipeline.download(&ctx)?;
        if self.cancelled() {
            return Ok(Outcome::Stopped);
        }

        board.enter(JobPhase::Preprocessing, "Preprocessing text...");
        pipeline.preprocess(&ctx)?;
        if self.cancelled() {
            return Ok(Outcome::Stopped);
        }

        board.enter(JobPhase::LoadingEmbeddings, "Loading embeddings...");
        pipeline.load_embeddings(&ctx)?;
        if self.cancelled() {
            return Ok(Outcome::Stopped);
        }

        board.enter(JobPhase::BuildingModel, "Building model...");
        pipeline.build_model(&ctx)?;
        if self.cancelled() {
            return Ok(Outcome::Stopped);
        }

        board.update(|r| r.total_epochs = self.config.epochs);
        board.enter(
            JobPhase::Training,
            &format!("Training started with {} epochs...", self.config.epochs),
        );
        let mut observer = ProgressObserver::new(board, &self.cancel);
        let history = pipeline.train(&ctx, &mut observer)?;
        if self.cancelled() {
            return Ok(Outcome::Stopped);
        }

        board.enter(JobPhase::Saving, "Saving model...");
        let snapshot = pipeline.save(&ctx, &history)?;
        if !self.cancel.commit() {
            return Ok(Outcome::Stopped);
        }

        self.registry.set(snapshot);
        Ok(Outcome::Completed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "internal panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::job::pipeline::TrainingPipeline;

    fn supervisor(cancel: Option<Arc<CancelToken>>) -> Supervisor {
        let factory: PipelineFactory = Arc::new(
            |_config: &TrainingConfig| -> PipelineResult<Box<dyn TrainingPipeline>> {
                Err(PipelineError::Other("unused".to_string()))
            },
        );
        let board = Arc::new(StatusBoard::new());
        board.reset(&TrainingConfig::default());
        Supervisor {
            board,
            registry: Arc::new(ModelRegistry::new(4)),
            factory,
            current: cancel,
        }
    }

    #[test]
    fn test_stop_is_accepted_before_commit() {
        let cancel = Arc::new(CancelToken::new());
        let mut sup = supervisor(Some(Arc::clone(&cancel)));
        assert_eq!(sup.stop(), Ok(()));
        assert!(cancel.is_requested());
        assert!(!cancel.commit());
        assert_eq!(sup.board.logs_since(0), vec!["Stop signal received..."]);
    }

    #[test]
    fn test_stop_is_refused_after_commit() {
        let cancel = Arc::new(CancelToken::new());
        assert!(cancel.commit());
        let mut sup = supervisor(Some(Arc::clone(&cancel)));
        assert_eq!(sup.stop(), Err(JobError::NotRunning));
        assert!(!cancel.is_requested());
        assert!(sup.board.logs_since(0).is_empty());
    }
}
