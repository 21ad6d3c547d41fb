//! Types for representing engine output

use serde::{Deserialize, Serialize};
use std::fmt;

/// Centipawn value standing in for a forced mate in loss arithmetic
pub const MATE_SCORE: i32 = 10_000;
/// Each move of mate distance costs this much, so shorter mates rank higher
pub const MATE_DISTANCE_STEP: i32 = 10;

/// Represents a position evaluation, always relative to the side to move
/// at the evaluated position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Evaluation {
    /// Centipawn score (positive = side to move is better)
    #[serde(rename = "cp")]
    Centipawns(i32),
    /// Forced mate in N moves (positive = side to move mates,
    /// negative = side to move gets mated, 0 = side to move is mated)
    Mate(i32),
}

impl Evaluation {
    pub fn is_mate(&self) -> bool {
        matches!(self, Evaluation::Mate(_))
    }

    pub fn mate_in(&self) -> Option<i32> {
        match self {
            Evaluation::Mate(moves) => Some(*moves),
            Evaluation::Centipawns(_) => None,
        }
    }

    /// Converts to a comparable centipawn value from the side to move's
    /// point of view. Mate scores map near ±`MATE_SCORE`.
    pub fn to_centipawns(&self) -> i32 {
        match *self {
            Evaluation::Centipawns(cp) => cp,
            Evaluation::Mate(0) => -MATE_SCORE,
            Evaluation::Mate(moves) if moves > 0 => {
                MATE_SCORE.saturating_sub(MATE_DISTANCE_STEP.saturating_mul(moves))
            }
            Evaluation::Mate(moves) => {
                -MATE_SCORE.saturating_add(MATE_DISTANCE_STEP.saturating_mul(moves))
            }
        }
    }

    /// The same evaluation seen by the other side
    pub fn flipped(&self) -> Evaluation {
        match *self {
            Evaluation::Centipawns(cp) => Evaluation::Centipawns(cp.saturating_neg()),
            Evaluation::Mate(moves) => Evaluation::Mate(moves.saturating_neg()),
        }
    }

    /// Converts to a human-readable score in pawns
    pub fn as_score(&self) -> f32 {
        self.to_centipawns() as f32 / 100.0
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => {
                let score = *cp as f32 / 100.0;
                if score >= 0.0 {
                    write!(f, "+{:.2}", score)
                } else {
                    write!(f, "{:.2}", score)
                }
            }
            Evaluation::Mate(moves) => write!(f, "M{}", moves),
        }
    }
}

/// Complete analysis of a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionAnalysis {
    /// Best move found in UCI notation, None when the side to move has no moves
    pub best_move: Option<String>,
    /// Evaluation of the position
    pub evaluation: Evaluation,
    /// Analysis depth reached
    pub depth: u32,
    /// Principal variation (best line of play)
    pub pv: Vec<String>,
    /// Time spent analyzing (milliseconds)
    pub time_ms: u64,
    /// Nodes searched
    pub nodes: u64,
}

impl PositionAnalysis {
    /// An analysis decided without searching, e.g. for a mated side
    pub fn terminal(evaluation: Evaluation) -> Self {
        Self {
            best_move: None,
            evaluation,
            depth: 0,
            pv: Vec::new(),
            time_ms: 0,
            nodes: 0,
        }
    }

    /// Returns a brief summary of the analysis
    pub fn summary(&self) -> String {
        format!(
            "Eval: {} | Best: {} | Depth: {} | PV: {}",
            self.evaluation,
            self.best_move.as_deref().unwrap_or("-"),
            self.depth,
            self.pv.iter().take(5).cloned().collect::<Vec<_>>().join(" ")
        )
    }
}
