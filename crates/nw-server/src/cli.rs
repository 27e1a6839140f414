use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nw_core::{Generator, JobPhase, ModelRegistry, TrainingConfig, TrainingJob};
use nw_train::{factory, ArtifactStore, PipelineSettings};

use crate::routes;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "nw-server",
    version,
    about = "Serve next-word predictions from a recurrent model and retrain it on demand."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Run one training job in the foreground
    Train(TrainArgs),
}

/// Where data and models live.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Directory for trained model artifacts
    #[arg(long, env = "NW_MODEL_DIR", default_value = "saved_models")]
    pub model_dir: PathBuf,

    /// Directory for the downloaded corpus and embedding files
    #[arg(long, env = "NW_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Corpus URL or local file
    #[arg(long, env = "NW_CORPUS_URL", default_value = nw_train::settings::SHAKESPEARE_URL)]
    pub corpus_url: String,

    /// Words per model input window
    #[arg(long, default_value_t = 50)]
    pub sequence_length: usize,

    /// Vocabulary cap, padding and <OOV> included
    #[arg(long, default_value_t = 10_000)]
    pub max_vocab_size: usize,

    /// Train on at most this many windows
    #[arg(long)]
    pub max_samples: Option<usize>,
}

impl PathArgs {
    fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            sequence_length: self.sequence_length,
            max_vocab_size: self.max_vocab_size,
            data_dir: self.data_dir.clone(),
            model_dir: self.model_dir.clone(),
            corpus_url: self.corpus_url.clone(),
            max_samples: self.max_samples,
            ..PipelineSettings::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    #[command(flatten)]
    pub paths: PathArgs,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value_t = 50)]
    pub epochs: usize,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Width of the recurrent layer
    #[arg(long, default_value_t = 256)]
    pub lstm_units: usize,

    #[arg(long, default_value_t = 300)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f32,

    #[command(flatten)]
    pub paths: PathArgs,
}

impl From<&TrainArgs> for TrainingConfig {
    fn from(a: &TrainArgs) -> Self {
        TrainingConfig {
            epochs: a.epochs,
            batch_size: a.batch_size,
            lstm_units: a.lstm_units,
            embedding_dim: a.embedding_dim,
            learning_rate: a.learning_rate,
        }
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Serve(args) => run_serve(args),
            Commands::Train(args) => run_train(args),
        }
    }
}

/// Install saved artifacts in `registry`, if there are any.
fn load_saved_model(registry: &ModelRegistry, model_dir: &std::path::Path) {
    let store = ArtifactStore::new(model_dir);
    if !store.exists() {
        tracing::warn!(dir = %model_dir.display(), "no trained model found, training endpoints remain available");
        return;
    }
    match store.load().and_then(|loaded| loaded.into_snapshot()) {
        Ok(snapshot) => registry.set(snapshot),
        Err(e) => tracing::warn!(error = %e, "saved model could not be loaded"),
    }
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let settings = args.paths.settings();
    let registry = Arc::new(ModelRegistry::new(settings.sequence_length));
    load_saved_model(&registry, &settings.model_dir);

    let job = TrainingJob::spawn(Arc::clone(&registry), factory(settings))
        .context("starting training supervisor")?;
    let state = AppState::new(registry, Generator::new(), job);
    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;

    let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("serving HTTP")
    })
}

fn run_train(args: TrainArgs) -> Result<()> {
    let settings = args.paths.settings();
    let registry = Arc::new(ModelRegistry::new(settings.sequence_length));
    let job = TrainingJob::spawn(registry, factory(settings)).context("starting training supervisor")?;

    job.start(TrainingConfig::from(&args))?;

    let mut printed = 0;
    loop {
        let running = job.is_running();
        for line in job.logs_since(printed) {
            println!("{line}");
            printed += 1;
        }
        if !running {
            break;
        }
        thread::sleep(Duration::from_millis(250));
    }

    let status = job.status();
    match status.phase {
        JobPhase::Completed => Ok(()),
        JobPhase::Stopped => bail!("training stopped"),
        phase => bail!(
            "training ended in phase {phase}: {}",
            status.error.unwrap_or_default()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nw_model::{FitHistory, RecurrentModel, RnnConfig, Vocabulary};
    use nw_tensor::{Shape, Tensor};
    use nw_train::artifacts::MODEL_FILE;
    use nw_train::ArtifactConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn save_model(dir: &std::path::Path) {
        let vocab = Vocabulary::from_words(["to", "be", "or", "not"].map(String::from)).unwrap();
        let config = RnnConfig {
            vocab_size: vocab.len(),
            sequence_length: 3,
            embedding_dim: 4,
            hidden_units: 5,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let embedding = Tensor::uniform(Shape::matrix(vocab.len(), 4), 0.1, &mut rng);
        let model = RecurrentModel::new(config, embedding, &mut rng).unwrap();
        let history = FitHistory::default();
        let described = ArtifactConfig::describe(&model, &history, "random");
        ArtifactStore::new(dir)
            .save(&model, &vocab, &described, &history)
            .unwrap();
    }

    #[test]
    fn test_startup_load_marks_model_loaded() {
        let dir = tempfile::tempdir().unwrap();
        save_model(dir.path());
        let registry = ModelRegistry::new(50);
        assert!(!registry.status().model_loaded);

        load_saved_model(&registry, dir.path());
        let status = registry.status();
        assert!(status.model_loaded);
        assert_eq!(status.vocab_size, 6);
        assert_eq!(status.sequence_length, 3);
    }

    #[test]
    fn test_startup_without_artifacts_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(50);
        load_saved_model(&registry, &dir.path().join("missing"));
        assert!(!registry.status().model_loaded);
    }

    #[test]
    fn test_startup_with_corrupt_model_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        save_model(dir.path());
        std::fs::write(dir.path().join(MODEL_FILE), b"{not json").unwrap();
        let registry = ModelRegistry::new(50);
        load_saved_model(&registry, dir.path());
        assert!(!registry.status().model_loaded);
    }
}
