pub mod architecture;
pub mod error;
pub mod rnn;
pub mod tokenizer;

pub use architecture::LanguageModel;
pub use error::{ModelError, Result};
pub use rnn::{
    fit, Dataset, EpochControl, EpochMetrics, EpochObserver, FitHistory, FitOptions,
    RecurrentModel, RnnConfig,
};
pub use tokenizer::vocab::{Vocabulary, OOV_ID, OOV_TOKEN, PAD_ID};
