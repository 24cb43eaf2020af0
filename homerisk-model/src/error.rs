use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid job id: {0}")]
    InvalidJobId(String),

    #[error("invalid analysis: {0}")]
    InvalidAnalysis(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
