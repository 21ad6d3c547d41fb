//! Opening identification from game tags and material

use shakmaty::Position;

use super::types::OpeningInfo;
use crate::parser::ParsedGame;

/// Never count more plies than this while walking the opening
const OPENING_WALK_LIMIT: u32 = 20;
/// Trades are only checked from this ply on
const MIN_OPENING_PLIES: u32 = 10;
/// Fewer pieces than this means material has come off
const FULL_MATERIAL_PIECES: usize = 30;
/// Reported opening length never exceeds this
const MAX_OPENING_PLIES: u32 = 15;

/// Reads name and ECO code from the tags and estimates how many plies
/// the opening lasted.
pub fn identify_opening(game: &ParsedGame) -> OpeningInfo {
    let mut plies = 0;
    for ply in &game.plies {
        if plies >= OPENING_WALK_LIMIT {
            break;
        }
        plies += 1;

        if plies >= MIN_OPENING_PLIES
            && ply.after.board().occupied().count() < FULL_MATERIAL_PIECES
        {
            break;
        }
    }

    OpeningInfo {
        name: game.tags.opening.clone(),
        eco: game.tags.eco.clone(),
        plies: plies.min(MAX_OPENING_PLIES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_game;

    #[test]
    fn test_tags_read() {
        let game = parse_game(
            "[ECO \"B20\"]\n[Opening \"Sicilian Defense\"]\n\n1. e4 c5 2. Nf3 *\n",
        )
        .unwrap();
        let opening = identify_opening(&game);
        assert_eq!(opening.name.as_deref(), Some("Sicilian Defense"));
        assert_eq!(opening.eco.as_deref(), Some("B20"));
        assert_eq!(opening.plies, 3);
    }

    #[test]
    fn test_untagged_opening_is_unset() {
        let game = parse_game("1. d4 d5").unwrap();
        let opening = identify_opening(&game);
        assert_eq!(opening.name, None);
        assert_eq!(opening.eco, None);
    }

    #[test]
    fn test_quiet_opening_clipped() {
        // 20 plies without a capture
        let game = parse_game(
            "1. Nf3 Nf6 2. Nc3 Nc6 3. Nb1 Nb8 4. Ng1 Ng8 5. Nf3 Nf6 \
             6. Nc3 Nc6 7. Nb1 Nb8 8. Ng1 Ng8 9. Nf3 Nf6 10. Nc3 Nc6 11. e4",
        )
        .unwrap();
        assert_eq!(identify_opening(&game).plies, 15);
    }

    #[test]
    fn test_trades_end_opening() {
        // Four captures by ply 9 leave 28 pieces, checked first at ply 10
        let game = parse_game(
            "1. e4 e5 2. Nf3 Nc6 3. d4 exd4 4. Nxd4 Nxd4 5. Qxd4 d6 6. Bc4 Be6",
        )
        .unwrap();
        assert_eq!(identify_opening(&game).plies, 10);
    }
}
