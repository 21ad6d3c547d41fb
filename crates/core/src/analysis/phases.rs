//! Game phase segmentation and swing-based position flags

use super::classify::Classification;
use super::types::{GamePhase, MoveRecord};

/// Swing that makes a move a key position within its phase
pub const PHASE_KEY_SWING_CP: u32 = 100;
/// Swing that makes a move a critical position of the whole game
pub const CRITICAL_SWING_CP: u32 = 150;
/// Loss above which a move is listed among the blunders
pub const BLUNDER_LOSS_CP: i32 = 300;

const MAX_OPENING_END: usize = 20;
const MIN_MIDDLEGAME_MOVES: usize = 10;

/// Phase boundaries over `total_moves` moves, as `(opening_end, endgame_start)`.
///
/// The opening always holds the first move of a non-empty game and no
/// boundary runs past `total_moves + 1`.
pub fn phase_boundaries(total_moves: usize) -> (usize, usize) {
    let end = total_moves + 1;
    let opening_end = (total_moves / 3).min(MAX_OPENING_END).max(2).min(end);
    let endgame_start = (opening_end + MIN_MIDDLEGAME_MOVES)
        .max(total_moves * 2 / 3)
        .min(end);
    (opening_end, endgame_start)
}

/// Splits the player's moves into opening, middlegame and endgame.
pub fn segment(moves: &[MoveRecord]) -> (GamePhase, GamePhase, GamePhase) {
    let total = moves.len();
    let (opening_end, endgame_start) = phase_boundaries(total);

    (
        build_phase("opening", moves, 1, opening_end),
        build_phase("middlegame", moves, opening_end, endgame_start),
        build_phase("endgame", moves, endgame_start, total + 1),
    )
}

fn build_phase(name: &str, moves: &[MoveRecord], start: usize, end: usize) -> GamePhase {
    // Windows are 1-based over the move sequence
    let window = &moves[start - 1..end - 1];

    GamePhase {
        name: name.to_string(),
        move_start: start,
        move_end: end,
        acpl: average_loss(window),
        move_count: window.len(),
        key_positions: window
            .iter()
            .filter(|m| m.abs_swing() > PHASE_KEY_SWING_CP)
            .cloned()
            .collect(),
    }
}

/// Mean absolute loss, 0 for no moves
pub fn average_loss(moves: &[MoveRecord]) -> f64 {
    if moves.is_empty() {
        return 0.0;
    }
    let total: u64 = moves
        .iter()
        .map(|m| u64::from(m.centipawn_loss.unsigned_abs()))
        .sum();
    total as f64 / moves.len() as f64
}

/// Accuracy percentage from average loss: 100 at zero loss, 0 from 1000 up
pub fn accuracy_from_acpl(acpl: f64) -> f64 {
    (100.0 - acpl / 10.0).clamp(0.0, 100.0)
}

pub fn critical_positions(moves: &[MoveRecord]) -> Vec<MoveRecord> {
    moves
        .iter()
        .filter(|m| m.abs_swing() > CRITICAL_SWING_CP)
        .cloned()
        .collect()
}

pub fn blunder_moves(moves: &[MoveRecord]) -> Vec<MoveRecord> {
    moves
        .iter()
        .filter(|m| {
            m.classification == Some(Classification::Blunder)
                && m.centipawn_loss > BLUNDER_LOSS_CP
        })
        .cloned()
        .collect()
}
