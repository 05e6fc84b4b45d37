//! Error types for the training core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvmError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid label: expected -1 or +1, got {0}")]
    InvalidLabel(f64),

    #[error("Empty training set")]
    EmptyTrainingSet,

    #[error("Training set contains no {0} examples")]
    MissingClass(&'static str),

    #[error("Degenerate Hessian diagonal at index {index}: {value}")]
    DegenerateDiagonal { index: usize, value: f64 },
}

pub type Result<T> = std::result::Result<T, SvmError>;
