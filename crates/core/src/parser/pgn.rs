//! Movetext parsing: PGN text into a validated sequence of plies

use pgn_reader::{RawTag, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Move, Position, Role, Square};
use std::fs;
use std::io::Cursor;
use std::ops::ControlFlow;
use std::path::Path;

use crate::error::{Error, Result};

/// Tag pairs kept from the game header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameTags {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub white_elo: Option<u16>,
    pub black_elo: Option<u16>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    pub fen: Option<String>,
    pub variant: Option<String>,
}

/// A single half-move with the positions on either side of it
#[derive(Debug, Clone)]
pub struct Ply {
    /// 1-based index in the game
    pub index: u32,
    /// Full-move number the ply belongs to
    pub move_number: u32,
    pub mover: Color,
    /// The move in SAN notation (e.g., "Nf3+")
    pub san: String,
    /// The move in UCI notation (e.g., "g1f3")
    pub uci: String,
    pub mv: Move,
    pub before: Chess,
    pub after: Chess,
}

impl Ply {
    pub fn fen_before(&self) -> String {
        position_fen(&self.before)
    }

    pub fn fen_after(&self) -> String {
        position_fen(&self.after)
    }
}

/// A fully validated game
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub tags: GameTags,
    pub start: Chess,
    pub plies: Vec<Ply>,
}

impl ParsedGame {
    pub fn ply_count(&self) -> usize {
        self.plies.len()
    }

    /// The position after the last ply
    pub fn final_position(&self) -> &Chess {
        self.plies.last().map(|p| &p.after).unwrap_or(&self.start)
    }

    /// Every position of the game in order: the start, then one per ply
    pub fn positions(&self) -> impl Iterator<Item = &Chess> {
        std::iter::once(&self.start).chain(self.plies.iter().map(|p| &p.after))
    }

    pub fn summary(&self) -> String {
        let white = self.tags.white.as_deref().unwrap_or("Unknown");
        let black = self.tags.black.as_deref().unwrap_or("Unknown");
        let result = self.tags.result.as_deref().unwrap_or("*");
        format!("{} vs {} - {}", white, black, result)
    }
}

struct GameMoves {
    tags: GameTags,
    start: Chess,
    current_position: Chess,
    plies: Vec<Ply>,
}

struct GameParser;

type ParseOutcome = std::result::Result<ParsedGame, String>;

impl Visitor for GameParser {
    type Tags = GameTags;
    type Movetext = GameMoves;
    type Output = ParseOutcome;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let name_str = String::from_utf8_lossy(name);
        let value_str = value.decode_utf8_lossy().to_string();

        match name_str.as_ref() {
            "Event" => tags.event = Some(value_str),
            "Site" => tags.site = Some(value_str),
            "Date" => tags.date = Some(value_str),
            "White" => tags.white = Some(value_str),
            "Black" => tags.black = Some(value_str),
            "Result" => tags.result = Some(value_str),
            "WhiteElo" => tags.white_elo = value_str.parse().ok(),
            "BlackElo" => tags.black_elo = value_str.parse().ok(),
            "ECO" => tags.eco = Some(value_str),
            "Opening" => tags.opening = Some(value_str),
            "FEN" => tags.fen = Some(value_str),
            "Variant" => tags.variant = Some(value_str),
            _ => {}
        }

        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        if let Some(variant) = tags.variant.as_deref() {
            if !variant.eq_ignore_ascii_case("standard") {
                return ControlFlow::Break(Err(format!("unsupported variant: {}", variant)));
            }
        }

        let start = match tags.fen.as_deref() {
            Some(fen) => match setup_position(fen) {
                Ok(pos) => pos,
                Err(e) => return ControlFlow::Break(Err(e)),
            },
            None => Chess::default(),
        };

        ControlFlow::Continue(GameMoves {
            tags,
            current_position: start.clone(),
            start,
            plies: Vec::new(),
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        let index = movetext.plies.len() as u32 + 1;
        let before = movetext.current_position.clone();

        let mv = match san.san.to_move(&before) {
            Ok(m) => m,
            Err(e) => {
                return ControlFlow::Break(Err(format!(
                    "illegal move {} at ply {}: {}",
                    san, index, e
                )))
            }
        };

        let after = match before.clone().play(mv.clone()) {
            Ok(pos) => pos,
            Err(_) => {
                return ControlFlow::Break(Err(format!("illegal move {} at ply {}", san, index)))
            }
        };

        movetext.plies.push(Ply {
            index,
            move_number: before.fullmoves().get(),
            mover: before.turn(),
            san: san.to_string(),
            uci: move_to_uci(&mv),
            mv,
            before,
            after: after.clone(),
        });
        movetext.current_position = after;

        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        if movetext.plies.is_empty() {
            return Err("game has no moves".to_string());
        }

        Ok(ParsedGame {
            tags: movetext.tags,
            start: movetext.start,
            plies: movetext.plies,
        })
    }
}

fn setup_position(fen: &str) -> std::result::Result<Chess, String> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| format!("invalid FEN tag {:?}: {}", fen, e))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| format!("invalid starting position {:?}: {}", fen, e))
}

/// Parses the first game of a PGN text (or bare movetext).
///
/// Fails when the text is empty, malformed, has no moves, or contains an
/// illegal move at any ply.
pub fn parse_game(pgn: &str) -> Result<ParsedGame> {
    if pgn.trim().is_empty() {
        return Err(Error::Parse("empty movetext".into()));
    }
    check_movetext(pgn).map_err(Error::Parse)?;

    let mut parser = GameParser;
    let mut reader = pgn_reader::Reader::new(Cursor::new(pgn.as_bytes()));

    match reader.read_game(&mut parser) {
        Ok(Some(Ok(game))) => Ok(game),
        Ok(Some(Err(reason))) => Err(Error::Parse(reason)),
        Ok(None) => Err(Error::Parse("no game found".into())),
        Err(e) => Err(Error::Parse(e.to_string())),
    }
}

/// Parses every game in a PGN text. Any invalid game fails the whole batch.
pub fn parse_games(pgn: &str) -> Result<Vec<ParsedGame>> {
    check_movetext(pgn).map_err(Error::Parse)?;

    let mut parser = GameParser;
    let mut games: Vec<ParsedGame> = Vec::new();

    let mut reader = pgn_reader::Reader::new(Cursor::new(pgn.as_bytes()));

    loop {
        match reader.read_game(&mut parser) {
            Ok(Some(Ok(game))) => games.push(game),
            Ok(Some(Err(reason))) => {
                return Err(Error::Parse(format!("game {}: {}", games.len() + 1, reason)))
            }
            Ok(None) => break,
            Err(e) => return Err(Error::Parse(e.to_string())),
        }
    }

    if games.is_empty() {
        Err(Error::Parse("no valid games found in PGN".into()))
    } else {
        Ok(games)
    }
}

/// Checks every mainline token of a PGN text before it is replayed.
///
/// The reader skips tokens it cannot read as a move, which would shift
/// every later ply, so anything that is not a tag, comment, variation,
/// move number, NAG, result or well-formed SAN is rejected here.
fn check_movetext(pgn: &str) -> std::result::Result<(), String> {
    let mut chars = pgn.chars();
    let mut token = String::new();
    let mut variation_depth = 0usize;
    let mut at_line_start = true;

    while let Some(c) = chars.next() {
        let starts_line = at_line_start;
        at_line_start = c == '\n';

        let escape_line = c == '%' && starts_line;
        if c.is_whitespace() || escape_line || matches!(c, '{' | ';' | '(' | ')' | '[') {
            if variation_depth == 0 && !token.is_empty() {
                check_token(&token)?;
            }
            token.clear();
        }

        match c {
            '{' => skip_past(&mut chars, '}'),
            ';' => {
                skip_past(&mut chars, '\n');
                at_line_start = true;
            }
            '%' if escape_line => {
                skip_past(&mut chars, '\n');
                at_line_start = true;
            }
            '(' => variation_depth += 1,
            ')' => variation_depth = variation_depth.saturating_sub(1),
            '[' => skip_tag(&mut chars),
            c if c.is_whitespace() => {}
            c => token.push(c),
        }
    }

    if variation_depth == 0 && !token.is_empty() {
        check_token(&token)?;
    }
    Ok(())
}

fn skip_past(chars: &mut std::str::Chars<'_>, end: char) {
    for c in chars.by_ref() {
        if c == end {
            return;
        }
    }
}

/// Skips a tag pair up to its closing bracket, honoring quoted values
fn skip_tag(chars: &mut std::str::Chars<'_>) {
    let mut quoted = false;
    let mut escaped = false;
    for c in chars.by_ref() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ']' if !quoted => return,
            _ => {}
        }
    }
}

fn check_token(token: &str) -> std::result::Result<(), String> {
    if matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*") {
        return Ok(());
    }

    // Move numbers, possibly glued to the move ("1.e4", "12...Nf6")
    let unnumbered = token.trim_start_matches(|c: char| c.is_ascii_digit());
    let mv = if unnumbered.is_empty() {
        return Ok(());
    } else if unnumbered.len() < token.len() && unnumbered.starts_with('.') {
        unnumbered.trim_start_matches('.')
    } else {
        token
    };

    if let Some(nag) = mv.strip_prefix('$') {
        if !nag.is_empty() && nag.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(());
        }
        return Err(format!("malformed annotation {:?}", token));
    }

    let san = mv.trim_end_matches(['!', '?']);
    if san.is_empty() {
        return Ok(());
    }
    let san = if san.starts_with("0-0") {
        san.replace('0', "O")
    } else {
        san.to_string()
    };

    SanPlus::from_ascii(san.as_bytes())
        .map(|_| ())
        .map_err(|_| format!("malformed move {:?}", token))
}

pub fn parse_pgn_file<P: AsRef<Path>>(path: P) -> Result<Vec<ParsedGame>> {
    let contents = fs::read_to_string(path)?;
    parse_games(&contents)
}

pub fn position_fen(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// Convert shakmaty Move to UCI string, castling as king-to-target
pub fn move_to_uci(mv: &Move) -> String {
    match mv {
        Move::Normal {
            from,
            to,
            promotion,
            ..
        } => {
            let promo = promotion
                .map(|r| match r {
                    Role::Queen => "q",
                    Role::Rook => "r",
                    Role::Bishop => "b",
                    Role::Knight => "n",
                    _ => "",
                })
                .unwrap_or("");
            format!("{}{}{}", from, to, promo)
        }
        Move::EnPassant { from, to, .. } => format!("{}{}", from, to),
        Move::Castle { king, rook } => {
            let king_to = if rook.file() > king.file() {
                Square::from_coords(File::G, king.rank())
            } else {
                Square::from_coords(File::C, king.rank())
            };
            format!("{}{}", king, king_to)
        }
        Move::Put { .. } => String::new(),
    }
}
