//! Parser module for reading chess game formats
//!
//! Currently supports:
//! - PGN (Portable Game Notation), including bare movetext

pub mod pgn;

// Re-export commonly used items for convenience
pub use pgn::{
    move_to_uci, parse_game, parse_games, parse_pgn_file, position_fen, GameTags, ParsedGame, Ply,
};
