//! Analysis configuration: search budget, engine options, perspective flag

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::error::{Error, Result};

/// Shortest time limit the engine protocol can express.
pub const MIN_TIME_LIMIT: Duration = Duration::from_millis(1);

/// Extra time granted on top of the search time limit before a position
/// is considered timed out.
pub const RESPONSE_GRACE: Duration = Duration::from_millis(500);

pub const DEFAULT_DEPTH: u32 = 15;
pub const DEFAULT_TIME_LIMIT_SECS: f64 = 1.0;
pub const DEFAULT_HASH_MB: u32 = 512;
pub const DEFAULT_THREADS: u32 = 2;

/// Depth and wall-clock bounds for a single search.
///
/// Both bounds are passed to the engine; whichever is reached first ends
/// the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedBudget")]
pub struct SearchBudget {
    depth: u32,
    time_limit: Duration,
}

/// Wire form of [`SearchBudget`], validated on the way in.
#[derive(Deserialize)]
struct UncheckedBudget {
    depth: u32,
    time_limit: Duration,
}

impl TryFrom<UncheckedBudget> for SearchBudget {
    type Error = Error;

    fn try_from(raw: UncheckedBudget) -> Result<Self> {
        Self::new(raw.depth, raw.time_limit)
    }
}

impl SearchBudget {
    pub fn new(depth: u32, time_limit: Duration) -> Result<Self> {
        if depth == 0 {
            return Err(Error::Configuration("search depth must be positive".into()));
        }
        if time_limit < MIN_TIME_LIMIT {
            return Err(Error::Configuration(format!(
                "time limit must be at least {:?}, got {:?}",
                MIN_TIME_LIMIT, time_limit
            )));
        }
        Ok(Self { depth, time_limit })
    }

    /// Builds a budget from a time limit given in (possibly fractional) seconds.
    pub fn from_secs_f64(depth: u32, seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(Error::Configuration(format!(
                "time limit must be a positive number of seconds, got {}",
                seconds
            )));
        }
        let time_limit = Duration::try_from_secs_f64(seconds).map_err(|e| {
            Error::Configuration(format!("time limit of {} seconds: {}", seconds, e))
        })?;
        Self::new(depth, time_limit)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Budget used for the single retry after a timeout: half the depth.
    pub fn reduced(&self) -> Self {
        Self {
            depth: (self.depth / 2).max(1),
            time_limit: self.time_limit,
        }
    }

    /// How long to wait for one search to answer.
    pub fn response_ceiling(&self) -> Duration {
        self.time_limit.saturating_add(RESPONSE_GRACE)
    }

    /// Wall-clock ceiling for a whole game of `positions` evaluated
    /// positions, allowing every position one retry.
    pub fn game_ceiling(&self, positions: usize) -> Duration {
        let per_position = self.response_ceiling().saturating_mul(2);
        let positions = u32::try_from(positions.max(1)).unwrap_or(u32::MAX);
        per_position.saturating_mul(positions)
    }
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            time_limit: Duration::from_secs_f64(DEFAULT_TIME_LIMIT_SECS),
        }
    }
}

/// How to start the engine process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Path to stockfish binary (or "stockfish" if in PATH)
    pub path: String,
    pub hash_mb: u32,
    pub threads: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            path: "stockfish".to_string(),
            hash_mb: DEFAULT_HASH_MB,
            threads: DEFAULT_THREADS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub engine: EngineOptions,
    pub budget: SearchBudget,
}

impl AnalysisConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; set but invalid ones are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup("STOCKFISH_PATH").unwrap_or_else(|| "stockfish".to_string());
        let depth = parse_var(&lookup, "STOCKFISH_DEPTH", DEFAULT_DEPTH)?;
        let seconds = parse_var(&lookup, "STOCKFISH_TIME", DEFAULT_TIME_LIMIT_SECS)?;
        let hash_mb = parse_var(&lookup, "STOCKFISH_HASH", DEFAULT_HASH_MB)?;
        let threads = parse_var(&lookup, "STOCKFISH_THREADS", DEFAULT_THREADS)?;

        if threads == 0 {
            return Err(Error::Configuration("STOCKFISH_THREADS must be positive".into()));
        }

        Ok(Self {
            engine: EngineOptions {
                path,
                hash_mb,
                threads,
            },
            budget: SearchBudget::from_secs_f64(depth, seconds)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("invalid value for {}: {:?}", key, raw))),
    }
}

/// The side whose moves are being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(Side::White),
            "black" => Ok(Side::Black),
            other => Err(Error::Configuration(format!(
                "player colour must be \"white\" or \"black\", got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}
