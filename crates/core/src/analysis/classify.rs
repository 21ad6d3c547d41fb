//! Move quality classification

use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Move, Position, Role};
use std::fmt;

/// Inclusive upper bounds of centipawn loss per tier
pub const BEST_MAX_LOSS: f64 = 10.0;
pub const EXCELLENT_MAX_LOSS: f64 = 25.0;
pub const GOOD_MAX_LOSS: f64 = 50.0;
pub const INACCURACY_MAX_LOSS: f64 = 100.0;
pub const MISTAKE_MAX_LOSS: f64 = 300.0;

/// An opponent error at least this large makes punishing it a great move
pub const PUNISHABLE_LOSS: f64 = 100.0;
/// A sacrifice is only sound if the mover is not worse afterwards
pub const SOUND_SACRIFICE_FLOOR_CP: i32 = 0;

/// Quality tier, from most to least favorable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Brilliant,
    Great,
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Classification {
    pub const ALL: [Classification; 8] = [
        Classification::Brilliant,
        Classification::Great,
        Classification::Best,
        Classification::Excellent,
        Classification::Good,
        Classification::Inaccuracy,
        Classification::Mistake,
        Classification::Blunder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Brilliant => "brilliant",
            Classification::Great => "great",
            Classification::Best => "best",
            Classification::Excellent => "excellent",
            Classification::Good => "good",
            Classification::Inaccuracy => "inaccuracy",
            Classification::Mistake => "mistake",
            Classification::Blunder => "blunder",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies by centipawn loss alone. The engine's own choice is always `Best`.
pub fn classify(centipawn_loss: f64, is_engine_best: bool) -> Classification {
    if is_engine_best {
        return Classification::Best;
    }
    match centipawn_loss {
        l if l <= BEST_MAX_LOSS => Classification::Best,
        l if l <= EXCELLENT_MAX_LOSS => Classification::Excellent,
        l if l <= GOOD_MAX_LOSS => Classification::Good,
        l if l <= INACCURACY_MAX_LOSS => Classification::Inaccuracy,
        l if l <= MISTAKE_MAX_LOSS => Classification::Mistake,
        // NaN lands here too; it never compares <= anything
        _ => Classification::Blunder,
    }
}

/// What the loss table cannot see about a move
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveContext {
    pub is_engine_best: bool,
    /// The move leaves a piece en prise without winning equal material
    pub is_sacrifice: bool,
    /// Centipawn loss of the opponent's preceding ply, if it was scored
    pub previous_opponent_loss: Option<i32>,
    /// Evaluation after the move from the mover's point of view
    pub eval_after_cp: i32,
}

/// Classifies a move, checking for brilliant and great moves before
/// falling back to the loss table.
///
/// - brilliant: an engine-approved (or within the best bound) sacrifice
///   after which the mover is not worse
/// - great: the engine's top choice right after the opponent made a
///   mistake or blunder
pub fn classify_move(centipawn_loss: f64, context: &MoveContext) -> Classification {
    let engine_approved = context.is_engine_best || centipawn_loss <= BEST_MAX_LOSS;

    if engine_approved
        && context.is_sacrifice
        && context.eval_after_cp >= SOUND_SACRIFICE_FLOOR_CP
    {
        return Classification::Brilliant;
    }

    let punishes = context
        .previous_opponent_loss
        .map_or(false, |loss| loss as f64 >= PUNISHABLE_LOSS);
    if context.is_engine_best && punishes {
        return Classification::Great;
    }

    classify(centipawn_loss, context.is_engine_best)
}

pub fn role_value(role: Role) -> u32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

/// Whether `mv`, played from `before` into `after`, offers material.
///
/// The moved piece (knight or heavier) must stand attacked by the
/// opponent, either undefended or attacked by something cheaper, and the
/// move must not have captured material worth at least as much.
pub fn is_sacrifice(before: &Chess, mv: &Move, after: &Chess) -> bool {
    let mover = before.turn();
    let to = mv.to();
    let role = mv.promotion().unwrap_or_else(|| mv.role());
    let value = role_value(role);
    if value < 3 {
        return false;
    }

    let captured = mv.capture().map(role_value).unwrap_or(0);
    if captured >= value {
        return false;
    }

    let board = after.board();
    let occupied = board.occupied();
    let attackers = board.attacks_to(to, mover.other(), occupied);
    if attackers.is_empty() {
        return false;
    }

    let defended = !board.attacks_to(to, mover, occupied).is_empty();
    let cheapest_attacker = attackers
        .into_iter()
        .filter_map(|sq| board.role_at(sq))
        .map(|r| if r == Role::King { u32::MAX } else { role_value(r) })
        .min()
        .unwrap_or(u32::MAX);

    !defended || cheapest_attacker < value
}
