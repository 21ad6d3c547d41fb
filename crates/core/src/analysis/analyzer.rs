//! End-to-end game analysis: parse, evaluate every position, classify,
//! segment and aggregate

use std::future::{self, Future};
use std::time::Instant;

use shakmaty::{Color, Position};
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::classify::{classify_move, is_sacrifice, MoveContext};
use super::opening::identify_opening;
use super::phases::{accuracy_from_acpl, average_loss, blunder_moves, critical_positions, segment};
use super::types::{AnalysisResult, ClassificationTally, MoveRecord};
use crate::config::{AnalysisConfig, SearchBudget, Side};
use crate::engine::{evaluate_position, Evaluation, Oracle, OracleLauncher, PositionAnalysis, StockfishLauncher};
use crate::error::{Error, Result};
use crate::parser::{parse_game, ParsedGame, Ply};

/// Analyzes games with a fresh oracle session per call.
///
/// Holds no state between calls, so one analyzer can serve many
/// concurrent games; each call launches and shuts down its own session.
pub struct GameAnalyzer<L> {
    launcher: L,
}

impl GameAnalyzer<StockfishLauncher> {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(StockfishLauncher::new(config.engine.clone()))
    }
}

impl<L: OracleLauncher> GameAnalyzer<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Analyzes a movetext for one side.
    pub async fn analyze(
        &self,
        movetext: &str,
        player: Side,
        budget: &SearchBudget,
    ) -> Result<AnalysisResult> {
        self.analyze_with_cancel(movetext, player, budget, future::pending())
            .await
    }

    /// Like [`analyze`](Self::analyze), aborted with `Error::Cancelled`
    /// as soon as `cancel` completes.
    pub async fn analyze_with_cancel<C>(
        &self,
        movetext: &str,
        player: Side,
        budget: &SearchBudget,
        cancel: C,
    ) -> Result<AnalysisResult>
    where
        C: Future<Output = ()> + Send,
    {
        let game = parse_game(movetext)?;
        self.analyze_game_with_cancel(&game, player, budget, cancel)
            .await
    }

    pub async fn analyze_game(
        &self,
        game: &ParsedGame,
        player: Side,
        budget: &SearchBudget,
    ) -> Result<AnalysisResult> {
        self.analyze_game_with_cancel(game, player, budget, future::pending())
            .await
    }

    pub async fn analyze_game_with_cancel<C>(
        &self,
        game: &ParsedGame,
        player: Side,
        budget: &SearchBudget,
        cancel: C,
    ) -> Result<AnalysisResult>
    where
        C: Future<Output = ()> + Send,
    {
        let started = Instant::now();
        info!(
            game = %game.summary(),
            plies = game.ply_count(),
            %player,
            depth = budget.depth(),
            "Starting game analysis"
        );

        tokio::pin!(cancel);

        // A launch still in flight is dropped on cancel, taking its process with it
        let launched = tokio::select! {
            biased;
            _ = &mut cancel => {
                warn!("Analysis cancelled before the engine was ready");
                return Err(Error::Cancelled);
            }
            launched = self.launcher.launch() => launched,
        };
        let mut session = launched.map_err(|e| {
            error!(error = %e, "Failed to start engine");
            Error::EngineUnavailable(e.to_string())
        })?;
        let engine_name = session.name().to_string();

        // One evaluation per distinct position: the start plus one per ply
        let ceiling = budget.game_ceiling(game.ply_count() + 1);
        let outcome = {
            let pipeline = timeout(ceiling, evaluate_game(&mut session, game, budget));
            tokio::select! {
                biased;
                _ = &mut cancel => Err(Error::Cancelled),
                result = pipeline => result.unwrap_or(Err(Error::GameTimeout(ceiling))),
            }
        };

        session.shutdown().await;

        let records = outcome.map_err(|e| {
            error!(error = %e, "Game analysis aborted");
            e
        })?;

        let result = build_result(
            game,
            player,
            records,
            engine_name,
            started.elapsed().as_millis() as u64,
        );

        info!(
            player_acpl = result.player_acpl,
            blunders = result.blunder_moves.len(),
            unscored = result.unscored_moves,
            elapsed_ms = result.analysis_time_ms,
            "Analysis completed"
        );

        Ok(result)
    }
}

/// Walks the game in order, producing one record per ply.
async fn evaluate_game<O: Oracle>(
    session: &mut O,
    game: &ParsedGame,
    budget: &SearchBudget,
) -> Result<Vec<MoveRecord>> {
    let mut records = Vec::with_capacity(game.ply_count());
    let mut before = evaluate_or_degrade(session, &game.start, budget).await?;
    let mut previous_loss: Option<i32> = None;

    for ply in &game.plies {
        let after = evaluate_or_degrade(session, &ply.after, budget).await?;
        let record = build_record(ply, before.as_ref(), after.as_ref(), previous_loss);
        if record.unscored {
            warn!(ply = ply.index, san = %ply.san, "Ply left unscored");
        }

        previous_loss = (!record.unscored).then_some(record.centipawn_loss);
        records.push(record);
        before = after;
    }

    Ok(records)
}

/// Evaluates a position, turning non-fatal failures into `None`.
async fn evaluate_or_degrade<O: Oracle>(
    session: &mut O,
    position: &shakmaty::Chess,
    budget: &SearchBudget,
) -> Result<Option<PositionAnalysis>> {
    match evaluate_position(session, position, budget).await {
        Ok(analysis) => Ok(Some(analysis)),
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "Position could not be evaluated");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// An evaluation as seen by `perspective`, given who was to move
pub fn perspective_cp(evaluation: Evaluation, side_to_move: Color, perspective: Color) -> i32 {
    let cp = evaluation.to_centipawns();
    if side_to_move == perspective {
        cp
    } else {
        cp.saturating_neg()
    }
}

/// Loss for the mover between two mover-relative values, clipped at zero
pub fn centipawn_loss(mover_cp_before: i32, mover_cp_after: i32) -> i32 {
    mover_cp_before.saturating_sub(mover_cp_after).max(0)
}

fn build_record(
    ply: &Ply,
    before: Option<&PositionAnalysis>,
    after: Option<&PositionAnalysis>,
    previous_opponent_loss: Option<i32>,
) -> MoveRecord {
    let best_move = before.and_then(|a| a.best_move.clone());
    let is_engine_best = best_move.as_deref() == Some(ply.uci.as_str());

    let mut record = MoveRecord {
        ply: ply.index,
        move_number: ply.move_number,
        mover: ply.mover.into(),
        san: ply.san.clone(),
        uci: ply.uci.clone(),
        fen_before: ply.fen_before(),
        fen_after: ply.fen_after(),
        eval_before: before.map(|a| a.evaluation),
        eval_after: after.map(|a| a.evaluation),
        mover_cp_before: 0,
        mover_cp_after: 0,
        swing: 0,
        centipawn_loss: 0,
        best_move,
        principal_variation: before.map(|a| a.pv.clone()).unwrap_or_default(),
        is_engine_best,
        classification: None,
        unscored: true,
    };

    let (Some(before), Some(after)) = (before, after) else {
        return record;
    };

    let cp_before = perspective_cp(before.evaluation, ply.before.turn(), ply.mover);
    let cp_after = perspective_cp(after.evaluation, ply.after.turn(), ply.mover);
    let loss = centipawn_loss(cp_before, cp_after);

    let context = MoveContext {
        is_engine_best,
        is_sacrifice: is_sacrifice(&ply.before, &ply.mv, &ply.after),
        previous_opponent_loss,
        eval_after_cp: cp_after,
    };

    record.mover_cp_before = cp_before;
    record.mover_cp_after = cp_after;
    record.swing = cp_after.saturating_sub(cp_before);
    record.centipawn_loss = loss;
    record.classification = Some(classify_move(loss as f64, &context));
    record.unscored = false;
    record
}

fn build_result(
    game: &ParsedGame,
    player: Side,
    records: Vec<MoveRecord>,
    engine_name: String,
    analysis_time_ms: u64,
) -> AnalysisResult {
    let total_plies = records.len();
    let (moves, opponent_moves): (Vec<MoveRecord>, Vec<MoveRecord>) =
        records.into_iter().partition(|r| r.mover == player);

    let player_acpl = average_loss(&moves);
    let opponent_acpl = average_loss(&opponent_moves);
    let (opening_phase, middlegame_phase, endgame_phase) = segment(&moves);

    AnalysisResult {
        player,
        total_plies,
        total_moves: moves.len(),
        player_acpl,
        opponent_acpl,
        player_accuracy: accuracy_from_acpl(player_acpl),
        opponent_accuracy: accuracy_from_acpl(opponent_acpl),
        tally: ClassificationTally::from_records(&moves),
        unscored_moves: moves.iter().filter(|m| m.unscored).count() as u32,
        opening_phase,
        middlegame_phase,
        endgame_phase,
        opening: identify_opening(game),
        critical_positions: critical_positions(&moves),
        blunder_moves: blunder_moves(&moves),
        moves,
        engine_name,
        analysis_time_ms,
    }
}
