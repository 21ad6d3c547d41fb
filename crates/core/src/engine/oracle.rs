//! The narrow request/response boundary to an external chess engine

use std::future::Future;

use thiserror::Error;

use super::analysis::PositionAnalysis;
use crate::config::SearchBudget;

/// Error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to start the engine process
    #[error("Failed to start engine: {0}")]
    Spawn(String),
    /// UCI handshake did not complete
    #[error("Engine handshake failed: {0}")]
    Handshake(String),
    /// No score before the time budget ran out
    #[error("Engine timed out at depth {depth}")]
    Timeout { depth: u32 },
    /// Engine returned unexpected response
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Failed to communicate with engine
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Engine closed its output
    #[error("Engine process exited")]
    Closed,
}

/// One engine session. A session is stateful and must not be shared
/// between concurrent analyses.
pub trait Oracle: Send {
    /// Engine name as reported by the engine itself
    fn name(&self) -> &str;

    /// Search the position given as FEN within the budget.
    fn evaluate(
        &mut self,
        fen: &str,
        budget: &SearchBudget,
    ) -> impl Future<Output = Result<PositionAnalysis, EngineError>> + Send;

    /// Release the session and whatever process backs it.
    fn shutdown(self) -> impl Future<Output = ()> + Send;
}

/// Starts a fresh oracle session per analysis.
pub trait OracleLauncher: Send + Sync {
    type Session: Oracle;

    fn launch(&self) -> impl Future<Output = Result<Self::Session, EngineError>> + Send;
}
