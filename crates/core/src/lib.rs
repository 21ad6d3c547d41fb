//! Game Analysis Core Library
//!
//! Replays a PGN game, asks a UCI engine to score every position, and
//! turns the scores into per-move classifications, phase statistics and
//! an accuracy summary for one side.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;

pub use analysis::{
    AnalysisResult, AnalysisSummary, Classification, ClassificationTally, GameAnalyzer,
    GamePhase, MoveRecord, OpeningInfo,
};
pub use config::{AnalysisConfig, EngineOptions, SearchBudget, Side};
pub use engine::{Evaluation, Oracle, OracleLauncher, PositionAnalysis, StockfishLauncher};
pub use error::{Error, Result};
pub use parser::{parse_game, parse_games, parse_pgn_file, ParsedGame};
