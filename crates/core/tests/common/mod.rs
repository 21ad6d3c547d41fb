//! Scripted oracle sessions for driving the analyzer without an engine.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use game_analysis_core::engine::{EngineError, Evaluation, Oracle, OracleLauncher, PositionAnalysis};
use game_analysis_core::parser::position_fen;
use game_analysis_core::{ParsedGame, SearchBudget};
use shakmaty::Chess;

pub const OPERA_GAME: &str = "1. e4 e5 2. Nf3 d6 3. d4 Bg4 4. dxe5 Bxf3 5. Qxf3 dxe5 \
    6. Bc4 Nf6 7. Qb3 Qe7 8. Nc3 c6 9. Bg5 b5 10. Nxb5 cxb5 11. Bxb5+ Nbd7 \
    12. O-O-O Rd8 13. Rxd7 Rxd7 14. Rd1 Qe6 15. Bxd7+ Nxd7 16. Qb8+ Nxb8 17. Rd8# 1-0";

/// Canned answers keyed by FEN
#[derive(Debug, Clone)]
pub struct Script {
    answers: HashMap<String, PositionAnalysis>,
    timeouts: HashSet<String>,
    deaths: HashSet<String>,
    default: Evaluation,
    delay: Option<Duration>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            answers: HashMap::new(),
            timeouts: HashSet::new(),
            deaths: HashSet::new(),
            default: Evaluation::Centipawns(0),
            delay: None,
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, position: &Chess, evaluation: Evaluation, best_move: Option<&str>) -> Self {
        let mut analysis = PositionAnalysis::terminal(evaluation);
        analysis.best_move = best_move.map(str::to_string);
        analysis.pv = best_move.map(|m| vec![m.to_string()]).unwrap_or_default();
        analysis.depth = 12;
        self.answers.insert(position_fen(position), analysis);
        self
    }

    /// Every search of this position times out, retries included
    pub fn time_out_at(mut self, position: &Chess) -> Self {
        self.timeouts.insert(position_fen(position));
        self
    }

    /// The engine process goes away when asked about this position
    pub fn die_at(mut self, position: &Chess) -> Self {
        self.deaths.insert(position_fen(position));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn reply(&self, fen: &str, depth: u32) -> Result<PositionAnalysis, EngineError> {
        if self.deaths.contains(fen) {
            return Err(EngineError::Closed);
        }
        if self.timeouts.contains(fen) {
            return Err(EngineError::Timeout { depth });
        }
        let mut analysis = self
            .answers
            .get(fen)
            .cloned()
            .unwrap_or_else(|| PositionAnalysis::terminal(self.default));
        analysis.depth = depth;
        Ok(analysis)
    }
}

/// Counters shared by a launcher and every session it starts
#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub evaluations: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

pub struct StubOracle {
    script: Arc<Script>,
    counters: Arc<Counters>,
}

impl Oracle for StubOracle {
    fn name(&self) -> &str {
        "Stub 1.0"
    }

    fn evaluate(
        &mut self,
        fen: &str,
        budget: &SearchBudget,
    ) -> impl Future<Output = Result<PositionAnalysis, EngineError>> + Send {
        let script = Arc::clone(&self.script);
        let counters = Arc::clone(&self.counters);
        let fen = fen.to_string();
        let depth = budget.depth();
        async move {
            counters.evaluations.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = script.delay {
                tokio::time::sleep(delay).await;
            }
            script.reply(&fen, depth)
        }
    }

    fn shutdown(self) -> impl Future<Output = ()> + Send {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        async {}
    }
}

#[derive(Clone)]
pub struct StubLauncher {
    script: Arc<Script>,
    launch_delay: Option<Duration>,
    pub counters: Arc<Counters>,
}

impl StubLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            launch_delay: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Sessions only become ready after this long; `launches` counts ready ones
    pub fn slow_start(mut self, delay: Duration) -> Self {
        self.launch_delay = Some(delay);
        self
    }
}

impl OracleLauncher for StubLauncher {
    type Session = StubOracle;

    fn launch(&self) -> impl Future<Output = Result<StubOracle, EngineError>> + Send {
        let session = StubOracle {
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
        };
        let delay = self.launch_delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            session.counters.launches.fetch_add(1, Ordering::SeqCst);
            Ok(session)
        }
    }
}

/// A launcher whose engine can never be reached
#[derive(Default)]
pub struct UnreachableLauncher {
    pub attempts: AtomicUsize,
}

impl OracleLauncher for UnreachableLauncher {
    type Session = StubOracle;

    fn launch(&self) -> impl Future<Output = Result<StubOracle, EngineError>> + Send {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(EngineError::Spawn("connection refused".into())) }
    }
}

pub fn budget() -> SearchBudget {
    SearchBudget::from_secs_f64(12, 0.05).unwrap()
}

/// Position after the given 1-based ply
pub fn after_ply(game: &ParsedGame, ply: usize) -> Chess {
    game.plies[ply - 1].after.clone()
}
