//! Stockfish chess engine interface
//!
//! Spawns Stockfish as a subprocess and communicates via UCI protocol
//! (async I/O). One process per session.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::analysis::{Evaluation, PositionAnalysis};
use super::oracle::{EngineError, Oracle, OracleLauncher};
use crate::config::{EngineOptions, SearchBudget, RESPONSE_GRACE};

/// How long the engine gets to answer `uci` and `isready`
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long to wait for the process to exit after `quit`
const QUIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Starts one Stockfish process per analysis
#[derive(Debug, Clone)]
pub struct StockfishLauncher {
    options: EngineOptions,
}

impl StockfishLauncher {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl OracleLauncher for StockfishLauncher {
    type Session = StockfishEngine;

    fn launch(&self) -> impl Future<Output = Result<StockfishEngine, EngineError>> + Send {
        let options = self.options.clone();
        async move { StockfishEngine::start(&options).await }
    }
}

/// Wrapper around a running Stockfish process
pub struct StockfishEngine {
    /// The child process
    process: Child,
    /// Stdin for sending commands
    stdin: ChildStdin,
    /// Line reader over stdout
    stdout: Lines<BufReader<ChildStdout>>,
    /// Name reported by `id name`
    name: String,
}

impl StockfishEngine {
    /// Spawns the engine, completes the UCI handshake and applies options.
    ///
    /// # Example
    /// ```ignore
    /// let mut engine = StockfishEngine::start(&EngineOptions::default()).await?;
    /// ```
    pub async fn start(options: &EngineOptions) -> Result<Self, EngineError> {
        let mut process = Command::new(&options.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {}", options.path, e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdin".into()))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdout".into()))?;

        let mut engine = StockfishEngine {
            process,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            name: String::new(),
        };

        match timeout(HANDSHAKE_TIMEOUT, engine.init_uci(options)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EngineError::Handshake(format!(
                    "no answer within {:?}",
                    HANDSHAKE_TIMEOUT
                )))
            }
        }

        debug!(engine = %engine.name, "Engine ready");
        Ok(engine)
    }

    /// Sends a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "SF <");
        self.stdin.write_all(format!("{}\n", cmd).as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Reads a line from the engine
    async fn read_line(&mut self) -> Result<String, EngineError> {
        match self.stdout.next_line().await? {
            Some(line) => {
                let line = line.trim().to_string();
                debug!(line = %line, "SF >");
                Ok(line)
            }
            None => Err(EngineError::Closed),
        }
    }

    /// Reads lines until one starts with the expected response
    async fn read_until(&mut self, expected: &str) -> Result<Vec<String>, EngineError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            let done = line.starts_with(expected);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    async fn init_uci(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        self.send("uci").await?;
        let lines = self.read_until("uciok").await?;
        self.name = lines
            .iter()
            .find_map(|l| l.strip_prefix("id name "))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "Unknown Engine".to_string());

        self.send(&format!("setoption name Threads value {}", options.threads))
            .await?;
        self.send(&format!("setoption name Hash value {}", options.hash_mb))
            .await?;
        self.send("ucinewgame").await?;
        self.send("isready").await?;
        self.read_until("readyok").await?;
        Ok(())
    }

    /// Waits for `readyok`, discarding anything left over from an aborted search
    async fn sync(&mut self, budget: &SearchBudget) -> Result<(), EngineError> {
        self.send("isready").await?;
        match timeout(HANDSHAKE_TIMEOUT, self.read_until("readyok")).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(EngineError::Timeout {
                depth: budget.depth(),
            }),
        }
    }

    /// Reads search output until `bestmove`
    async fn read_search(&mut self, search: &mut SearchState) -> Result<(), EngineError> {
        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                search.apply_bestmove(&line);
                return Ok(());
            } else if line.starts_with("info") {
                search.apply_info(&line);
            }
        }
    }

    /// Analyzes a position with both a depth and a time bound
    pub async fn analyze(
        &mut self,
        fen: &str,
        budget: &SearchBudget,
    ) -> Result<PositionAnalysis, EngineError> {
        self.sync(budget).await?;
        self.send(&format!("position fen {}", fen)).await?;
        self.send(&format!(
            "go depth {} movetime {}",
            budget.depth(),
            budget.time_limit().as_millis()
        ))
        .await?;

        let mut search = SearchState::default();
        let ceiling = budget.response_ceiling();

        if timeout(ceiling, self.read_search(&mut search)).await.is_err() {
            warn!(fen, depth = budget.depth(), ?ceiling, "Search overran its budget, stopping");
            self.send("stop").await?;
            match timeout(RESPONSE_GRACE, self.read_search(&mut search)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(EngineError::Timeout {
                        depth: budget.depth(),
                    })
                }
            }
            if search.evaluation.is_none() {
                return Err(EngineError::Timeout {
                    depth: budget.depth(),
                });
            }
        }

        search.finish()
    }

    /// Quit the engine cleanly, killing it if it does not exit in time
    pub async fn quit(mut self) {
        let _ = self.send("quit").await;
        if timeout(QUIT_TIMEOUT, self.process.wait()).await.is_err() {
            warn!(engine = %self.name, "Engine ignored quit, killing");
            let _ = self.process.kill().await;
        }
    }
}

impl Oracle for StockfishEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(
        &mut self,
        fen: &str,
        budget: &SearchBudget,
    ) -> impl Future<Output = Result<PositionAnalysis, EngineError>> + Send {
        self.analyze(fen, budget)
    }

    fn shutdown(self) -> impl Future<Output = ()> + Send {
        self.quit()
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Accumulates `info` output of one search
#[derive(Debug, Default)]
struct SearchState {
    evaluation: Option<Evaluation>,
    best_move: Option<String>,
    pv: Vec<String>,
    depth: u32,
    time_ms: u64,
    nodes: u64,
}

impl SearchState {
    /// Parses an info line from Stockfish
    fn apply_info(&mut self, line: &str) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.get(1) == Some(&"string") {
            return;
        }

        let mut i = 1;
        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    if let Some(d) = parts.get(i + 1).and_then(|s| s.parse().ok()) {
                        self.depth = d;
                    }
                    i += 2;
                }
                "score" => {
                    let bounded = matches!(
                        parts.get(i + 3),
                        Some(&"lowerbound") | Some(&"upperbound")
                    );
                    if !bounded {
                        let value = parts.get(i + 2).and_then(|s| s.parse::<i32>().ok());
                        match (parts.get(i + 1), value) {
                            (Some(&"cp"), Some(cp)) => {
                                self.evaluation = Some(Evaluation::Centipawns(cp))
                            }
                            (Some(&"mate"), Some(m)) => self.evaluation = Some(Evaluation::Mate(m)),
                            _ => {}
                        }
                    }
                    i += 3;
                }
                "time" => {
                    if let Some(t) = parts.get(i + 1).and_then(|s| s.parse().ok()) {
                        self.time_ms = t;
                    }
                    i += 2;
                }
                "nodes" => {
                    if let Some(n) = parts.get(i + 1).and_then(|s| s.parse().ok()) {
                        self.nodes = n;
                    }
                    i += 2;
                }
                "pv" => {
                    // Everything after "pv" is the principal variation
                    self.pv = parts[i + 1..].iter().map(|s| s.to_string()).collect();
                    break;
                }
                _ => {
                    i += 1;
                }
            }
        }
    }

    /// Parse: "bestmove e2e4 ponder e7e5"
    fn apply_bestmove(&mut self, line: &str) {
        self.best_move = line
            .split_whitespace()
            .nth(1)
            .filter(|m| *m != "(none)" && *m != "0000")
            .map(str::to_string);
    }

    fn finish(self) -> Result<PositionAnalysis, EngineError> {
        let evaluation = self
            .evaluation
            .ok_or_else(|| EngineError::Protocol("search ended without a score".into()))?;

        let best_move = self.best_move.or_else(|| self.pv.first().cloned());

        Ok(PositionAnalysis {
            best_move,
            evaluation,
            depth: self.depth,
            pv: self.pv,
            time_ms: self.time_ms,
            nodes: self.nodes,
        })
    }
}
