use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use nw_core::{
    ModelSnapshot, PhaseContext, PipelineError, PipelineFactory, PipelineResult, TrainingConfig,
    TrainingPipeline,
};
use nw_model::{fit, Dataset, EpochObserver, FitHistory, RecurrentModel, RnnConfig, Vocabulary};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::artifacts::{ArtifactConfig, ArtifactStore};
use crate::clean::clean_text;
use crate::corpus::{fetch_corpus, read_corpus};
use crate::embeddings::{build_embedding_matrix, find_embeddings, load_embedding_index, EmbeddingMatrix};
use crate::settings::PipelineSettings;

/// Corpus file → cleaned text → vocabulary → sliding windows →
/// embeddings → recurrent model → fitted model → artifacts.
pub struct CorpusPipeline {
    settings: PipelineSettings,
    config: TrainingConfig,
    rng: StdRng,
    corpus: Option<PathBuf>,
    vocabulary: Option<Vocabulary>,
    dataset: Option<Dataset>,
    embedding: Option<EmbeddingMatrix>,
    embedding_type: String,
    model: Option<RecurrentModel>,
}

impl CorpusPipeline {
    pub fn new(settings: PipelineSettings, config: TrainingConfig) -> Self {
        let rng = StdRng::seed_from_u64(settings.seed);
        Self {
            settings,
            config,
            rng,
            corpus: None,
            vocabulary: None,
            dataset: None,
            embedding: None,
            embedding_type: "random".to_string(),
            model: None,
        }
    }
}

/// Factory handing every accepted job a fresh `CorpusPipeline`.
pub fn factory(settings: PipelineSettings) -> PipelineFactory {
    Arc::new(move |config: &TrainingConfig| {
        let pipeline = CorpusPipeline::new(settings.clone(), config.clone());
        Ok(Box::new(pipeline) as Box<dyn TrainingPipeline>)
    })
}

fn out_of_order(phase: &'static str) -> PipelineError {
    PipelineError::OutOfOrder { phase }
}

impl TrainingPipeline for CorpusPipeline {
    fn prepare(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()> {
        fs::create_dir_all(&self.settings.data_dir)?;
        fs::create_dir_all(&self.settings.model_dir)?;
        ctx.log(format!(
            "Config: epochs={} batch_size={} lstm_units={} embedding_dim={} learning_rate={}",
            self.config.epochs,
            self.config.batch_size,
            self.config.lstm_units,
            self.config.embedding_dim,
            self.config.learning_rate
        ));
        Ok(())
    }

    fn download(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()> {
        let path = fetch_corpus(&self.settings.corpus_url, &self.settings.corpus_path())?;
        let bytes = fs::metadata(&path)?.len();
        ctx.log(format!("Corpus ready: {bytes} bytes"));
        self.corpus = Some(path);
        Ok(())
    }

    fn preprocess(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()> {
        let path = self.corpus.as_ref().ok_or_else(|| out_of_order("preprocess"))?;
        let cleaned = clean_text(&read_corpus(path)?);
        ctx.log(format!("Cleaned: {} characters", cleaned.len()));

        let vocabulary = Vocabulary::fit(&cleaned, self.settings.max_vocab_size)?;
        ctx.log(format!("Vocabulary size: {}", vocabulary.len()));

        let seq_len = self.settings.sequence_length;
        let mut ids = vocabulary.encode(&cleaned);
        if let Some(max) = self.settings.max_samples {
            ids.truncate(max.saturating_add(seq_len));
        }
        let dataset = Dataset::from_token_stream(&ids, seq_len);
        if dataset.is_empty() {
            return Err(PipelineError::Data(format!(
                "corpus has {} tokens, need more than {seq_len}",
                ids.len()
            )));
        }
        ctx.log(format!("Created {} sequences", dataset.len()));

        self.vocabulary = Some(vocabulary);
        self.dataset = Some(dataset);
        Ok(())
    }

    fn load_embeddings(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()> {
        let vocabulary = self.vocabulary.as_ref().ok_or_else(|| out_of_order("load_embeddings"))?;
        let dim = self.config.embedding_dim;

        let index = match find_embeddings(&self.settings.embedding_candidates()) {
            Some(path) => {
                ctx.log(format!("Found embeddings at: {}", path.display()));
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Some((load_embedding_index(&path, dim)?, name))
            }
            None => {
                ctx.log("No embedding file found, using random initialization");
                None
            }
        };

        let matrix = build_embedding_matrix(
            vocabulary,
            index.as_ref().map(|(index, name)| (index, name.as_str())),
            dim,
            &mut self.rng,
        )?;
        if index.is_some() {
            ctx.log(format!(
                "Found embeddings for {}/{} words",
                matrix.found,
                vocabulary.len()
            ));
        }
        self.embedding_type = matrix.source.clone();
        self.embedding = Some(matrix);
        Ok(())
    }

    fn build_model(&mut self, ctx: &PhaseContext<'_>) -> PipelineResult<()> {
        let vocabulary = self.vocabulary.as_ref().ok_or_else(|| out_of_order("build_model"))?;
        let embedding = self.embedding.take().ok_or_else(|| out_of_order("build_model"))?;
        let config = RnnConfig {
            vocab_size: vocabulary.len(),
            sequence_length: self.settings.sequence_length,
            embedding_dim: self.config.embedding_dim,
            hidden_units: self.config.lstm_units,
        };
        let model = RecurrentModel::new(config, embedding.matrix, &mut self.rng)?;
        ctx.log(format!(
            "Built RNN: vocab {} x embedding {} -> {} units",
            vocabulary.len(),
            self.config.embedding_dim,
            self.config.lstm_units
        ));
        self.model = Some(model);
        Ok(())
    }

    fn train(
        &mut self,
        ctx: &PhaseContext<'_>,
        observer: &mut dyn EpochObserver,
    ) -> PipelineResult<FitHistory> {
        let model = self.model.as_mut().ok_or_else(|| out_of_order("train"))?;
        let dataset = self.dataset.as_ref().ok_or_else(|| out_of_order("train"))?;
        let options = self.settings.fit_options(&self.config);

        let history = fit(model, dataset, &options, observer)?;
        if history.stopped_early {
            ctx.log(format!(
                "Early stopping after {} epochs, restored weights from epoch {}",
                history.epochs.len(),
                history.best_epoch.unwrap_or(history.epochs.len())
            ));
        }
        if let Some(last) = history.last() {
            match last.val_loss {
                Some(val) => ctx.log(format!("Final loss: {:.4} - val loss: {val:.4}", last.loss)),
                None => ctx.log(format!("Final loss: {:.4}", last.loss)),
            }
        }
        Ok(history)
    }

    fn save(&mut self, ctx: &PhaseContext<'_>, history: &FitHistory) -> PipelineResult<ModelSnapshot> {
        let model = self.model.take().ok_or_else(|| out_of_order("save"))?;
        let vocabulary = self.vocabulary.take().ok_or_else(|| out_of_order("save"))?;

        let store = ArtifactStore::new(&self.settings.model_dir);
        let config = ArtifactConfig::describe(&model, history, &self.embedding_type);
        store.save(&model, &vocabulary, &config, history)?;
        ctx.log(format!("Artifacts saved to {}", store.dir().display()));

        let sequence_length = model.config().sequence_length;
        Ok(ModelSnapshot::new(
            Arc::new(model),
            Arc::new(vocabulary),
            sequence_length,
            config.metadata(),
        )?)
    }
}
