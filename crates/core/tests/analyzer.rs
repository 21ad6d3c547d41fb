//! End-to-end analyzer tests against a scripted oracle.
//!
//! The Stockfish test at the bottom requires the binary in PATH.
//! Run with: `cargo test -p game-analysis-core --test analyzer -- --ignored`

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{after_ply, budget, Script, StubLauncher, UnreachableLauncher, OPERA_GAME};
use game_analysis_core::{
    parse_game, AnalysisConfig, AnalysisSummary, Classification, Error, Evaluation, GameAnalyzer,
    SearchBudget, Side,
};

#[tokio::test]
async fn test_single_quiet_move() {
    let analyzer = GameAnalyzer::new(StubLauncher::new(Script::new()));
    let result = analyzer.analyze("1. e4", Side::White, &budget()).await.unwrap();

    assert_eq!(result.total_plies, 1);
    assert_eq!(result.total_moves, 1);
    let record = &result.moves[0];
    assert_eq!(record.san, "e4");
    assert_eq!(record.uci, "e2e4");
    assert_eq!(record.centipawn_loss, 0);
    assert_eq!(record.classification, Some(Classification::Best));

    assert_eq!(result.opening_phase.move_count, 1);
    assert_eq!(result.middlegame_phase.move_count, 0);
    assert_eq!(result.endgame_phase.move_count, 0);
    assert_eq!(result.player_acpl, 0.0);
    assert_eq!(result.player_accuracy, 100.0);
    assert_eq!(result.engine_name, "Stub 1.0");
}

#[tokio::test]
async fn test_blunder_after_drop() {
    let game = parse_game("1. e4").unwrap();
    let script = Script::new()
        .answer(&game.start, Evaluation::Centipawns(0), Some("d2d4"))
        // Black to move and four pawns up
        .answer(&after_ply(&game, 1), Evaluation::Centipawns(400), Some("e7e5"));
    let analyzer = GameAnalyzer::new(StubLauncher::new(script));

    let result = analyzer.analyze_game(&game, Side::White, &budget()).await.unwrap();

    let record = &result.moves[0];
    assert_eq!(record.mover_cp_before, 0);
    assert_eq!(record.mover_cp_after, -400);
    assert_eq!(record.centipawn_loss, 400);
    assert_eq!(record.best_move.as_deref(), Some("d2d4"));
    assert!(!record.is_engine_best);
    assert_eq!(record.classification, Some(Classification::Blunder));

    let tally = result.tally;
    assert_eq!(tally.blunders, 1);
    assert_eq!(tally.brilliant_moves, 0);
    assert_eq!(tally.great_moves, 0);
    assert_eq!(tally.best_moves, 0);
    assert_eq!(tally.excellent_moves, 0);
    assert_eq!(tally.good_moves, 0);
    assert_eq!(tally.inaccuracies, 0);
    assert_eq!(tally.mistakes, 0);

    assert_eq!(result.blunder_moves.len(), 1);
    assert_eq!(result.critical_positions.len(), 1);
    assert_eq!(result.player_acpl, 400.0);
    assert_eq!(result.player_accuracy, 60.0);
}

#[tokio::test]
async fn test_malformed_movetext_starts_no_engine() {
    let launcher = StubLauncher::new(Script::new());
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);

    for movetext in [
        "",
        "   ",
        "[Event \"Truncated\"]\n\n*",
        "1. e4 e5 2. Ke3",
        "1. e4 xyz e5",
        "1. e4 e5 2. Zz9",
    ] {
        let err = analyzer
            .analyze(movetext, Side::White, &budget())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "{:?} gave {:?}", movetext, err);
    }
    assert_eq!(counters.launches(), 0);
    assert_eq!(counters.evaluations(), 0);
}

#[tokio::test]
async fn test_unreachable_engine() {
    let analyzer = GameAnalyzer::new(UnreachableLauncher::default());

    let err = analyzer
        .analyze("1. e4 e5", Side::Black, &budget())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EngineUnavailable(_)));
    assert_eq!(
        analyzer.launcher().attempts.load(std::sync::atomic::Ordering::SeqCst),
        1
    );

    // Parsing still comes first
    let err = analyzer.analyze("1. e5", Side::Black, &budget()).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[tokio::test]
async fn test_each_position_evaluated_once() {
    let launcher = StubLauncher::new(Script::new());
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);

    let result = analyzer.analyze(OPERA_GAME, Side::White, &budget()).await.unwrap();

    // 34 positions, the final checkmate is scored without the engine
    assert_eq!(result.total_plies, 33);
    assert_eq!(counters.evaluations(), 33);
    assert_eq!(counters.launches(), 1);
    assert_eq!(counters.shutdowns(), 1);

    let mate = result.moves.last().unwrap();
    assert_eq!(mate.san, "Rd8#");
    assert_eq!(mate.eval_after, Some(Evaluation::Mate(0)));
    assert_eq!(mate.mover_cp_after, 10_000);
    assert_eq!(mate.centipawn_loss, 0);
    assert_eq!(result.critical_positions.len(), 1);
}

#[tokio::test]
async fn test_move_counts_by_side() {
    let analyzer = GameAnalyzer::new(StubLauncher::new(Script::new()));

    let white = analyzer.analyze(OPERA_GAME, Side::White, &budget()).await.unwrap();
    let black = analyzer.analyze(OPERA_GAME, Side::Black, &budget()).await.unwrap();

    assert_eq!(white.total_moves, 17);
    assert_eq!(black.total_moves, 16);
    assert!(white.moves.iter().all(|m| m.mover == Side::White));
    assert!(black.moves.iter().all(|m| m.mover == Side::Black));
    assert!(white.moves.windows(2).all(|w| w[0].ply < w[1].ply));
}

#[tokio::test]
async fn test_phases_partition_player_moves() {
    let analyzer = GameAnalyzer::new(StubLauncher::new(Script::new()));

    for side in [Side::White, Side::Black] {
        let result = analyzer.analyze(OPERA_GAME, side, &budget()).await.unwrap();
        let phases = [
            &result.opening_phase,
            &result.middlegame_phase,
            &result.endgame_phase,
        ];

        assert_eq!(phases[0].move_start, 1);
        assert_eq!(phases[0].move_end, phases[1].move_start);
        assert_eq!(phases[1].move_end, phases[2].move_start);
        assert_eq!(phases[2].move_end, result.total_moves + 1);
        assert_eq!(
            phases.iter().map(|p| p.move_count).sum::<usize>(),
            result.total_moves
        );
    }
}

#[tokio::test]
async fn test_great_move_punishes_mistake() {
    let game = parse_game("1. e4 e5 2. Nf3").unwrap();
    let script = Script::new()
        .answer(&game.start, Evaluation::Centipawns(0), Some("e2e4"))
        .answer(&after_ply(&game, 1), Evaluation::Centipawns(0), Some("d7d5"))
        .answer(&after_ply(&game, 2), Evaluation::Centipawns(150), Some("g1f3"))
        .answer(&after_ply(&game, 3), Evaluation::Centipawns(-150), None);
    let analyzer = GameAnalyzer::new(StubLauncher::new(script));

    let white = analyzer.analyze_game(&game, Side::White, &budget()).await.unwrap();
    assert_eq!(white.moves[0].classification, Some(Classification::Best));
    assert_eq!(white.moves[1].classification, Some(Classification::Great));
    assert_eq!(white.tally.great_moves, 1);
    assert_eq!(white.tally.best_moves, 1);
    assert_eq!(white.opponent_acpl, 150.0);

    let black = analyzer.analyze_game(&game, Side::Black, &budget()).await.unwrap();
    assert_eq!(black.moves[0].centipawn_loss, 150);
    assert_eq!(black.moves[0].classification, Some(Classification::Mistake));
}

#[tokio::test]
async fn test_timed_out_position_leaves_plies_unscored() {
    let game = parse_game("1. e4 e5 2. Nf3").unwrap();
    let launcher = StubLauncher::new(Script::new().time_out_at(&after_ply(&game, 2)));
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);

    let result = analyzer.analyze_game(&game, Side::White, &budget()).await.unwrap();

    // Four positions, one of them searched twice
    assert_eq!(counters.evaluations(), 5);

    assert!(!result.moves[0].unscored);
    let unscored = &result.moves[1];
    assert!(unscored.unscored);
    assert_eq!(unscored.classification, None);
    assert_eq!(unscored.eval_before, None);
    assert_eq!(unscored.centipawn_loss, 0);

    assert_eq!(result.unscored_moves, 1);
    assert_eq!(result.tally.total(), 1);
    assert!(result.critical_positions.is_empty());
}

#[tokio::test]
async fn test_repeat_runs_are_identical() {
    let game = parse_game(OPERA_GAME).unwrap();
    let script = Script::new()
        .answer(&after_ply(&game, 6), Evaluation::Centipawns(-80), Some("d1e2"))
        .answer(&after_ply(&game, 19), Evaluation::Centipawns(-450), None)
        .answer(&after_ply(&game, 20), Evaluation::Mate(7), Some("b5d7"));
    let analyzer = GameAnalyzer::new(StubLauncher::new(script));

    let mut first = analyzer.analyze(OPERA_GAME, Side::Black, &budget()).await.unwrap();
    let mut second = analyzer.analyze(OPERA_GAME, Side::Black, &budget()).await.unwrap();
    first.analysis_time_ms = 0;
    second.analysis_time_ms = 0;

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn test_cancel_stops_and_releases_session() {
    let launcher = StubLauncher::new(Script::new().delay(Duration::from_millis(500)));
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);

    let err = analyzer
        .analyze_with_cancel(
            OPERA_GAME,
            Side::White,
            &budget(),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(counters.evaluations(), 1);
    assert_eq!(counters.shutdowns(), 1);
}

#[tokio::test]
async fn test_cancel_while_engine_starts() {
    let launcher = StubLauncher::new(Script::new()).slow_start(Duration::from_secs(30));
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);

    let started = std::time::Instant::now();
    let err = analyzer
        .analyze_with_cancel(
            OPERA_GAME,
            Side::White,
            &budget(),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(counters.launches(), 0);
    assert_eq!(counters.evaluations(), 0);
}

#[tokio::test]
async fn test_already_cancelled_never_launches() {
    let launcher = StubLauncher::new(Script::new());
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);

    let err = analyzer
        .analyze_with_cancel(OPERA_GAME, Side::Black, &budget(), std::future::ready(()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(counters.launches(), 0);
    assert_eq!(counters.shutdowns(), 0);
}

#[tokio::test]
async fn test_engine_death_mid_game() {
    let game = parse_game(OPERA_GAME).unwrap();
    let launcher = StubLauncher::new(Script::new().die_at(&after_ply(&game, 10)));
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);

    let err = analyzer
        .analyze(OPERA_GAME, Side::White, &budget())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EngineUnavailable(_)), "{:?}", err);
    assert_eq!(counters.launches(), 1);
    assert_eq!(counters.shutdowns(), 1);
    // Start plus ten plies, then nothing after the failure
    assert_eq!(counters.evaluations(), 11);
}

#[tokio::test]
async fn test_huge_time_budget() {
    let analyzer = GameAnalyzer::new(StubLauncher::new(Script::new()));
    let budget = SearchBudget::from_secs_f64(10, 1e18).unwrap();

    let result = analyzer.analyze(OPERA_GAME, Side::White, &budget).await.unwrap();
    assert_eq!(result.total_moves, 17);
}

#[tokio::test]
async fn test_game_ceiling_aborts_hung_engine() {
    let launcher = StubLauncher::new(Script::new().delay(Duration::from_secs(30)));
    let counters = Arc::clone(&launcher.counters);
    let analyzer = GameAnalyzer::new(launcher);
    let budget = SearchBudget::from_secs_f64(10, 0.002).unwrap();

    let err = analyzer.analyze("1. e4", Side::White, &budget).await.unwrap_err();

    assert!(matches!(err, Error::GameTimeout(_)));
    assert_eq!(counters.shutdowns(), 1);
}

#[tokio::test]
async fn test_concurrent_games_get_own_sessions() {
    let launcher = StubLauncher::new(Script::new());
    let counters = Arc::clone(&launcher.counters);
    let analyzer = Arc::new(GameAnalyzer::new(launcher));

    let handles: Vec<_> = [Side::White, Side::Black, Side::White, Side::Black]
        .into_iter()
        .map(|side| {
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move { analyzer.analyze(OPERA_GAME, side, &budget()).await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.total_plies, 33);
    }
    assert_eq!(counters.launches(), 4);
    assert_eq!(counters.shutdowns(), 4);
}

#[tokio::test]
async fn test_result_serialization() {
    let analyzer = GameAnalyzer::new(StubLauncher::new(Script::new()));
    let result = analyzer.analyze("1. d4 d5 2. c4", Side::White, &budget()).await.unwrap();

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["player"], "white");
    assert_eq!(json["blunders"], 0);
    assert_eq!(json["best_moves"], 2);
    assert_eq!(json["opening_phase"]["name"], "opening");
    assert_eq!(json["moves"][0]["eval_before"]["type"], "cp");

    let summary = AnalysisSummary::from(&result);
    assert_eq!(summary.total_moves, 2);
    assert_eq!(summary.tally.best_moves, 2);
}

/// Check if Stockfish is available in PATH.
fn stockfish_available() -> bool {
    std::process::Command::new("stockfish")
        .arg("quit")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}

#[tokio::test]
#[ignore = "requires Stockfish"]
async fn test_stockfish_game() {
    if !stockfish_available() {
        eprintln!("Skipping test: Stockfish not available");
        return;
    }

    let analyzer = GameAnalyzer::from_config(&AnalysisConfig::default());
    let budget = SearchBudget::from_secs_f64(8, 0.2).unwrap();

    let result = analyzer
        .analyze("1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7#", Side::Black, &budget)
        .await
        .expect("analysis failed");

    assert_eq!(result.total_moves, 3);
    assert!(result.engine_name.to_lowercase().contains("stockfish"));
    // 3...Nf6 walks into mate
    let last = result.moves.last().unwrap();
    assert_eq!(last.san, "Nf6");
    assert_eq!(last.classification, Some(Classification::Blunder));
    assert!(result.blunder_moves.iter().any(|m| m.san == "Nf6"));
}
