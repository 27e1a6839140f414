use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("matvec dimension mismatch: [{rows}x{cols}] @ [{len}]")]
    MatvecMismatch { rows: usize, cols: usize, len: usize },
    #[error("row {row} out of bounds for tensor with {rows} rows")]
    RowOutOfBounds { row: usize, rows: usize },
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
