//! Error types for game-analysis-core

use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("PGN parsing error: {0}")]
    Parse(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Engine timed out at depth {depth}")]
    EngineTimeout { depth: u32 },

    #[error("Evaluation failed for {fen}: {reason}")]
    EvaluationFailed { fen: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Game analysis exceeded its time ceiling of {0:?}")]
    GameTimeout(Duration),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Fatal errors abort the whole analysis; the rest only degrade a ply.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::EngineTimeout { .. } | Error::EvaluationFailed { .. }
        )
    }
}

impl From<EngineError> for Error {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Timeout { depth } => Error::EngineTimeout { depth },
            EngineError::Protocol(reason) => Error::EvaluationFailed {
                fen: String::new(),
                reason,
            },
            other => Error::EngineUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
