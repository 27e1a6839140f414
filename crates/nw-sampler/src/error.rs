use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("empty distribution")]
    Empty,

    #[error("invalid distribution: {0}")]
    InvalidWeights(String),
}
