//! Move classification, phase segmentation and the game analyzer

mod analyzer;
mod classify;
mod opening;
mod phases;
mod types;

pub use analyzer::{centipawn_loss, perspective_cp, GameAnalyzer};
pub use classify::{
    classify, classify_move, is_sacrifice, role_value, Classification, MoveContext,
};
pub use opening::identify_opening;
pub use phases::{
    accuracy_from_acpl, average_loss, blunder_moves, critical_positions, phase_boundaries,
    segment, BLUNDER_LOSS_CP, CRITICAL_SWING_CP, PHASE_KEY_SWING_CP,
};
pub use types::{
    AnalysisResult, AnalysisSummary, ClassificationTally, GamePhase, MoveRecord, OpeningInfo,
};
