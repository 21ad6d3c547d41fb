//! Position evaluation on top of an oracle session: terminal positions,
//! timeouts and the single reduced-depth retry

use shakmaty::{Chess, Position};
use tracing::warn;

use super::analysis::{Evaluation, PositionAnalysis};
use super::oracle::{EngineError, Oracle};
use crate::config::SearchBudget;
use crate::error::{Error, Result};
use crate::parser::position_fen;

/// Scores a position without the engine when the side to move has no
/// legal moves.
pub fn terminal_analysis(position: &Chess) -> Option<PositionAnalysis> {
    if !position.legal_moves().is_empty() {
        return None;
    }
    let evaluation = if position.is_checkmate() {
        Evaluation::Mate(0)
    } else {
        Evaluation::Centipawns(0)
    };
    Some(PositionAnalysis::terminal(evaluation))
}

/// Evaluates one position.
///
/// A timeout is retried once with a reduced depth; a second timeout, or a
/// malformed answer, becomes `EvaluationFailed`. Errors meaning the engine
/// is gone are returned as `EngineUnavailable`.
pub async fn evaluate_position<O: Oracle>(
    oracle: &mut O,
    position: &Chess,
    budget: &SearchBudget,
) -> Result<PositionAnalysis> {
    if let Some(analysis) = terminal_analysis(position) {
        return Ok(analysis);
    }

    let fen = position_fen(position);

    match oracle.evaluate(&fen, budget).await {
        Ok(analysis) => Ok(analysis),
        Err(EngineError::Timeout { depth }) => {
            let reduced = budget.reduced();
            warn!(fen = %fen, depth, retry_depth = reduced.depth(), "Evaluation timed out, retrying");
            oracle
                .evaluate(&fen, &reduced)
                .await
                .map_err(|e| degrade(fen, e))
        }
        Err(e) => Err(degrade(fen, e)),
    }
}

fn degrade(fen: String, error: EngineError) -> Error {
    match error {
        EngineError::Timeout { depth } => Error::EvaluationFailed {
            fen,
            reason: format!("timed out twice, last at depth {}", depth),
        },
        EngineError::Protocol(reason) => Error::EvaluationFailed { fen, reason },
        other => other.into(),
    }
}
