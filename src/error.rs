//! Error types for scorecard computation
//!
//! Only malformed requests and collaborator failures are errors. Data-quality
//! conditions (unmapped names, duplicate uploads, unknown raw keys) are
//! recovered locally and reported as warnings on the result instead.

use thiserror::Error;

/// Errors surfaced by the engine and its collaborators
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Snapshot source error: {0}")]
    Source(String),

    #[error("Dataset error: {0}")]
    Dataset(String),
}

impl EngineError {
    /// Stable machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Source(_) => "source_unavailable",
            EngineError::Dataset(_) => "dataset_error",
        }
    }

    /// Returns true if the caller sent a malformed request
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::InvalidInput(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
