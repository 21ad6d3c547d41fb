//! Analysis result types

use serde::{Deserialize, Serialize};

use super::classify::Classification;
use crate::config::Side;
use crate::engine::Evaluation;

/// One analyzed ply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 1-based ply index in the game
    pub ply: u32,
    pub move_number: u32,
    pub mover: Side,
    pub san: String,
    pub uci: String,
    pub fen_before: String,
    pub fen_after: String,
    /// Engine evaluation before the move, relative to the mover
    pub eval_before: Option<Evaluation>,
    /// Engine evaluation after the move, relative to the opponent (who is to move)
    pub eval_after: Option<Evaluation>,
    /// Both evaluations converted to the mover's point of view
    pub mover_cp_before: i32,
    pub mover_cp_after: i32,
    /// Signed change for the mover (after - before)
    pub swing: i32,
    /// How much the mover gave away, never negative
    pub centipawn_loss: i32,
    /// Engine's suggested move at the position before, in UCI notation
    pub best_move: Option<String>,
    pub principal_variation: Vec<String>,
    pub is_engine_best: bool,
    /// None when the ply could not be scored
    pub classification: Option<Classification>,
    pub unscored: bool,
}

impl MoveRecord {
    pub fn abs_swing(&self) -> u32 {
        self.swing.unsigned_abs()
    }
}

/// A span `[move_start, move_end)` of the player's moves, 1-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePhase {
    pub name: String,
    pub move_start: usize,
    pub move_end: usize,
    /// Average centipawn loss over the window, 0 when empty
    pub acpl: f64,
    pub move_count: usize,
    /// Moves whose evaluation swing exceeds the phase threshold
    pub key_positions: Vec<MoveRecord>,
}

/// Move classification counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTally {
    pub brilliant_moves: u32,
    pub great_moves: u32,
    pub best_moves: u32,
    pub excellent_moves: u32,
    pub good_moves: u32,
    pub inaccuracies: u32,
    pub mistakes: u32,
    pub blunders: u32,
}

impl ClassificationTally {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a MoveRecord>,
    {
        let mut tally = Self::default();
        for class in records.into_iter().filter_map(|r| r.classification) {
            tally.add(class);
        }
        tally
    }

    pub fn add(&mut self, class: Classification) {
        let slot = match class {
            Classification::Brilliant => &mut self.brilliant_moves,
            Classification::Great => &mut self.great_moves,
            Classification::Best => &mut self.best_moves,
            Classification::Excellent => &mut self.excellent_moves,
            Classification::Good => &mut self.good_moves,
            Classification::Inaccuracy => &mut self.inaccuracies,
            Classification::Mistake => &mut self.mistakes,
            Classification::Blunder => &mut self.blunders,
        };
        *slot += 1;
    }

    pub fn count(&self, class: Classification) -> u32 {
        match class {
            Classification::Brilliant => self.brilliant_moves,
            Classification::Great => self.great_moves,
            Classification::Best => self.best_moves,
            Classification::Excellent => self.excellent_moves,
            Classification::Good => self.good_moves,
            Classification::Inaccuracy => self.inaccuracies,
            Classification::Mistake => self.mistakes,
            Classification::Blunder => self.blunders,
        }
    }

    pub fn total(&self) -> u32 {
        Classification::ALL.iter().map(|c| self.count(*c)).sum()
    }
}

/// Opening identification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningInfo {
    pub name: Option<String>,
    pub eco: Option<String>,
    /// Plies considered part of the opening, at most 15
    pub plies: u32,
}

/// Complete analysis of one game for one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub player: Side,
    pub total_plies: usize,
    /// Number of the player's own moves
    pub total_moves: usize,

    pub player_acpl: f64,
    pub opponent_acpl: f64,
    pub player_accuracy: f64,
    pub opponent_accuracy: f64,

    #[serde(flatten)]
    pub tally: ClassificationTally,
    pub unscored_moves: u32,

    pub opening_phase: GamePhase,
    pub middlegame_phase: GamePhase,
    pub endgame_phase: GamePhase,

    pub opening: OpeningInfo,

    /// The player's moves in order
    pub moves: Vec<MoveRecord>,
    pub critical_positions: Vec<MoveRecord>,
    pub blunder_moves: Vec<MoveRecord>,

    pub engine_name: String,
    pub analysis_time_ms: u64,
}

impl AnalysisResult {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} | {} moves | ACPL {:.1} | accuracy {:.1}% | {} blunders, {} mistakes, {} inaccuracies",
            self.player,
            self.total_moves,
            self.player_acpl,
            self.player_accuracy,
            self.tally.blunders,
            self.tally.mistakes,
            self.tally.inaccuracies
        )
    }
}

/// Flat, persistence-ready view of a result.
///
/// A storage layer upserts these fields one by one into its own schema
/// instead of patching a stored record dynamically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub player: Side,
    pub total_moves: usize,
    pub player_acpl: f64,
    pub opponent_acpl: f64,
    pub accuracy: f64,
    #[serde(flatten)]
    pub tally: ClassificationTally,
    pub unscored_moves: u32,
    pub opening_acpl: f64,
    pub middlegame_acpl: f64,
    pub endgame_acpl: f64,
    pub opening_name: Option<String>,
    pub opening_eco: Option<String>,
    pub opening_plies: u32,
    pub critical_positions: usize,
    pub engine_name: String,
    pub analysis_time_ms: u64,
}

impl From<&AnalysisResult> for AnalysisSummary {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            player: result.player,
            total_moves: result.total_moves,
            player_acpl: result.player_acpl,
            opponent_acpl: result.opponent_acpl,
            accuracy: result.player_accuracy,
            tally: result.tally,
            unscored_moves: result.unscored_moves,
            opening_acpl: result.opening_phase.acpl,
            middlegame_acpl: result.middlegame_phase.acpl,
            endgame_acpl: result.endgame_phase.acpl,
            opening_name: result.opening.name.clone(),
            opening_eco: result.opening.eco.clone(),
            opening_plies: result.opening.plies,
            critical_positions: result.critical_positions.len(),
            engine_name: result.engine_name.clone(),
            analysis_time_ms: result.analysis_time_ms,
        }
    }
}
