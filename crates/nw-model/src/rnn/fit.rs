use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::adam::Adam;
use super::weights::{Gradients, RnnWeights};
use super::RecurrentModel;
use crate::error::{ModelError, Result};

/// Training samples: fixed-length windows and the id that follows each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    windows: Vec<Vec<u32>>,
    targets: Vec<u32>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slide a window of `sequence_length` over `ids`; every position from
    /// `sequence_length` onwards becomes one sample.
    pub fn from_token_stream(ids: &[u32], sequence_length: usize) -> Dataset {
        let mut data = Dataset::new();
        if sequence_length == 0 {
            return data;
        }
        for i in sequence_length..ids.len() {
            data.push(ids[i - sequence_length..i].to_vec(), ids[i]);
        }
        data
    }

    pub fn push(&mut self, window: Vec<u32>, target: u32) {
        self.windows.push(window);
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<(&[u32], u32)> {
        Some((self.windows.get(i)?.as_slice(), *self.targets.get(i)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u32], u32)> {
        self.windows
            .iter()
            .map(Vec::as_slice)
            .zip(self.targets.iter().copied())
    }

    /// Hold out the trailing `fraction` of samples for validation.
    pub fn split(&self, fraction: f32) -> (Dataset, Dataset) {
        let held_out = ((self.len() as f32) * fraction.clamp(0.0, 1.0)) as usize;
        let cut = self.len() - held_out;
        let train = Dataset {
            windows: self.windows[..cut].to_vec(),
            targets: self.targets[..cut].to_vec(),
        };
        let validation = Dataset {
            windows: self.windows[cut..].to_vec(),
            targets: self.targets[cut..].to_vec(),
        };
        (train, validation)
    }
}

/// Metrics reported at the end of every epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number.
    pub epoch: usize,
    pub total_epochs: usize,
    /// Mean training loss over the epoch.
    pub loss: f32,
    /// Training accuracy in [0, 1].
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
    /// Learning rate in effect during the epoch.
    pub learning_rate: f32,
}

/// Answer of an `EpochObserver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochControl {
    Continue,
    Halt,
}

/// Hook invoked after each epoch. Returning `Halt` ends training before the
/// next epoch starts.
pub trait EpochObserver {
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> EpochControl;
}

impl<F> EpochObserver for F
where
    F: FnMut(usize, &EpochMetrics) -> EpochControl,
{
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> EpochControl {
        self(epoch, metrics)
    }
}

/// Optimisation settings for `fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Trailing fraction of the samples held out for validation.
    pub validation_split: f32,
    /// Epochs without improvement before training stops and the best
    /// weights are restored. `None` disables early stopping.
    pub early_stopping_patience: Option<usize>,
    /// Epochs without improvement before the learning rate is reduced.
    pub plateau_patience: Option<usize>,
    pub plateau_factor: f32,
    pub min_learning_rate: f32,
    /// Global gradient-norm ceiling per batch.
    pub clip_norm: f32,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 128,
            learning_rate: 0.001,
            validation_split: 0.2,
            early_stopping_patience: Some(5),
            plateau_patience: Some(2),
            plateau_factor: 0.5,
            min_learning_rate: 1e-5,
            clip_norm: 5.0,
            seed: 42,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(ModelError::InvalidConfig(
                "epochs and batch_size must be > 0".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ModelError::InvalidConfig(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

/// Outcome of a `fit` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitHistory {
    pub epochs: Vec<EpochMetrics>,
    /// The observer asked to stop.
    pub halted: bool,
    /// Early stopping fired and the best weights were restored.
    pub stopped_early: bool,
    /// Epoch whose weights the model holds after early stopping.
    pub best_epoch: Option<usize>,
}

impl FitHistory {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

/// Tracks epochs since the monitored value last improved.
#[derive(Debug, Clone)]
struct Patience {
    limit: Option<usize>,
    best: f32,
    wait: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatienceSignal {
    Improved,
    Waiting,
    Exhausted,
}

impl Patience {
    fn new(limit: Option<usize>) -> Self {
        Patience {
            limit,
            best: f32::INFINITY,
            wait: 0,
        }
    }

    fn observe(&mut self, value: f32) -> PatienceSignal {
        if value < self.best {
            self.best = value;
            self.wait = 0;
            return PatienceSignal::Improved;
        }
        self.wait += 1;
        match self.limit {
            Some(limit) if self.wait >= limit => {
                self.wait = 0;
                PatienceSignal::Exhausted
            }
            _ => PatienceSignal::Waiting,
        }
    }
}

/// Train `model` in place on `data`.
///
/// Samples are shuffled every epoch and processed in mini-batches; each
/// batch's averaged, norm-clipped gradient feeds one Adam step. The
/// monitored value is the validation loss when a validation split exists,
/// otherwise the training loss.
pub fn fit(
    model: &mut RecurrentModel,
    data: &Dataset,
    options: &FitOptions,
    observer: &mut dyn EpochObserver,
) -> Result<FitHistory> {
    options.validate()?;
    let (train, validation) = data.split(options.validation_split);
    if train.is_empty() {
        return Err(ModelError::EmptyDataset);
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut adam = Adam::new(options.learning_rate, &model.weights.trainable_sizes());
    let mut grads = Gradients::zeros(&model.config);
    let mut order: Vec<usize> = (0..train.len()).collect();

    let mut history = FitHistory::default();
    let mut early_stop = Patience::new(options.early_stopping_patience);
    let mut plateau = Patience::new(options.plateau_patience);
    let mut best: Option<(usize, RnnWeights)> = None;

    tracing::debug!(
        train = train.len(),
        validation = validation.len(),
        epochs = options.epochs,
        "fit started"
    );

    for epoch in 1..=options.epochs {
        order.shuffle(&mut rng);

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        for batch in order.chunks(options.batch_size) {
            grads.reset();
            for &i in batch {
                let (window, target) = train
                    .get(i)
                    .ok_or_else(|| ModelError::Other(format!("sample {i} missing")))?;
                let trace = model.forward_trace(window)?;
                loss_sum += model.accumulate_gradients(&trace, target, &mut grads)? as f64;
                if trace.predicted() == target {
                    correct += 1;
                }
            }
            grads.scale(1.0 / batch.len() as f32);
            grads.clip(options.clip_norm);
            adam.step(model.weights.trainable_mut(), grads.parts());
        }

        let (val_loss, val_accuracy) = if validation.is_empty() {
            (None, None)
        } else {
            let (l, a) = model.evaluate(&validation)?;
            (Some(l), Some(a))
        };
        let metrics = EpochMetrics {
            epoch,
            total_epochs: options.epochs,
            loss: (loss_sum / train.len() as f64) as f32,
            accuracy: correct as f32 / train.len() as f32,
            val_loss,
            val_accuracy,
            learning_rate: adam.learning_rate(),
        };
        tracing::debug!(epoch, loss = metrics.loss, accuracy = metrics.accuracy, "epoch finished");
        history.epochs.push(metrics.clone());

        if observer.on_epoch_end(epoch, &metrics) == EpochControl::Halt {
            history.halted = true;
            break;
        }

        let monitored = metrics.val_loss.unwrap_or(metrics.loss);
        if !monitored.is_finite() {
            return Err(ModelError::Other(format!(
                "loss diverged at epoch {epoch}"
            )));
        }

        if plateau.observe(monitored) == PatienceSignal::Exhausted {
            let reduced = (adam.learning_rate() * options.plateau_factor)
                .max(options.min_learning_rate);
            if reduced < adam.learning_rate() {
                tracing::info!(epoch, learning_rate = reduced, "reducing learning rate on plateau");
                adam.set_learning_rate(reduced);
            }
        }

        match early_stop.observe(monitored) {
            PatienceSignal::Improved => best = Some((epoch, model.weights.clone())),
            PatienceSignal::Waiting => {}
            PatienceSignal::Exhausted => {
                if let Some((best_epoch, weights)) = best.take() {
                    tracing::info!(epoch, best_epoch, "early stopping, restoring best weights");
                    model.weights = weights;
                    history.best_epoch = Some(best_epoch);
                }
                history.stopped_early = true;
                break;
            }
        }
    }

    Ok(history)
}
