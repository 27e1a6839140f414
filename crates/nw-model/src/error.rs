use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid model config: {0}")]
    InvalidConfig(String),
    #[error("token id {id} exceeds vocab size {vocab_size}")]
    TokenOutOfRange { id: u32, vocab_size: usize },
    #[error("expected a window of {expected} token ids, got {got}")]
    WindowLength { expected: usize, got: usize },
    #[error("vocabulary error: {0}")]
    Vocabulary(String),
    #[error("dataset is empty")]
    EmptyDataset,
    #[error("tensor error: {0}")]
    Tensor(#[from] nw_tensor::TensorError),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
