//! Error types for the ANN index engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector store is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index has not been trained")]
    NotTrained,

    #[error("index has not been built")]
    NotBuilt,

    #[error("insufficient training samples: need at least {required}, got {got}")]
    InsufficientSamples { required: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, AnnError>;
