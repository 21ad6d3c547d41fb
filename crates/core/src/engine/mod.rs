//! Chess engine integration
//!
//! Provides the oracle boundary and a UCI implementation backed by Stockfish.

pub mod analysis;
pub mod evaluator;
pub mod oracle;
pub mod stockfish;

// Re-export main types for convenience
pub use analysis::{Evaluation, PositionAnalysis};
pub use evaluator::{evaluate_position, terminal_analysis};
pub use oracle::{EngineError, Oracle, OracleLauncher};
pub use stockfish::{StockfishEngine, StockfishLauncher};
