use std::env;
use std::process;
use std::sync::Arc;

use game_analysis_core::{
    parse_pgn_file, AnalysisConfig, AnalysisSummary, Error, GameAnalyzer, Result, SearchBudget,
    Side,
};
use serde_json::json;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command line options on top of the environment configuration
struct Options {
    pgn_file: String,
    player: Side,
    config: AnalysisConfig,
    jobs: usize,
    summary_only: bool,
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <pgn_file> <white|black> [options]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --depth N        Search depth per position (default: STOCKFISH_DEPTH or 15)");
    eprintln!("  --time S         Seconds per position (default: STOCKFISH_TIME or 1.0)");
    eprintln!("  --engine PATH    Engine binary (default: STOCKFISH_PATH or stockfish)");
    eprintln!("  --jobs N         Games analyzed concurrently (default: 1)");
    eprintln!("  --summary        Print flat summaries instead of full results");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} games.pgn white", program);
    eprintln!("  {} games.pgn black --depth 12 --time 0.5 --jobs 4", program);
}

fn parse_args(args: &[String]) -> Result<Options> {
    let (pgn_file, player) = match args {
        [_, file, side, ..] => (file.clone(), side.parse::<Side>()?),
        _ => return Err(Error::Configuration("missing arguments".into())),
    };

    let mut config = AnalysisConfig::from_env()?;
    let mut depth = config.budget.depth();
    let mut seconds = config.budget.time_limit().as_secs_f64();
    let mut jobs = 1;
    let mut summary_only = false;

    let mut rest = args[3..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--summary" => summary_only = true,
            "--depth" => depth = value(flag, rest.next())?,
            "--time" => seconds = value(flag, rest.next())?,
            "--jobs" => jobs = value(flag, rest.next())?,
            "--engine" => {
                config.engine.path = rest
                    .next()
                    .cloned()
                    .ok_or_else(|| Error::Configuration("--engine needs a path".into()))?
            }
            other => return Err(Error::Configuration(format!("unknown option {}", other))),
        }
    }

    if jobs == 0 {
        return Err(Error::Configuration("--jobs must be positive".into()));
    }
    config.budget = SearchBudget::from_secs_f64(depth, seconds)?;

    Ok(Options {
        pgn_file,
        player,
        config,
        jobs,
        summary_only,
    })
}

fn value<T: std::str::FromStr>(flag: &str, raw: Option<&String>) -> Result<T> {
    let raw = raw.ok_or_else(|| Error::Configuration(format!("{} needs a value", flag)))?;
    raw.parse()
        .map_err(|_| Error::Configuration(format!("invalid value for {}: {:?}", flag, raw)))
}

/// Report for a task that panicked or was aborted before producing an outcome
fn task_failure_report(game: usize, error: &JoinError) -> serde_json::Value {
    let reason = if error.is_panic() {
        "analysis task panicked"
    } else {
        "analysis task was aborted"
    };
    json!({ "game": game, "error": format!("{}: {}", reason, error) })
}

/// Completes once cancellation is requested; never if the sender goes away first.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("analyze-game");

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage(program);
            process::exit(2);
        }
    };

    let games = match parse_pgn_file(&options.pgn_file) {
        Ok(games) => games,
        Err(e) => {
            error!(file = %options.pgn_file, error = %e, "Failed to read games");
            process::exit(1);
        }
    };
    info!(
        games = games.len(),
        player = %options.player,
        jobs = options.jobs,
        engine = %options.config.engine.path,
        "Analyzing PGN file"
    );

    let analyzer = Arc::new(GameAnalyzer::from_config(&options.config));
    let semaphore = Arc::new(Semaphore::new(options.jobs));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling running analyses");
            let _ = cancel_tx.send(true);
        }
    });

    let mut handles = Vec::with_capacity(games.len());
    for game in games {
        let analyzer = Arc::clone(&analyzer);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancelled(cancel_rx.clone());
        let budget = options.config.budget;
        let player = options.player;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| Error::Cancelled)?;
            analyzer
                .analyze_game_with_cancel(&game, player, &budget, cancel)
                .await
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    let mut failures = 0;
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                failures += 1;
                error!(game = index + 1, error = %e, "Analysis task did not complete");
                reports.push(task_failure_report(index + 1, &e));
                continue;
            }
        };

        let report = match outcome {
            Ok(result) if options.summary_only => {
                json!({ "game": index + 1, "summary": AnalysisSummary::from(&result) })
            }
            Ok(result) => json!({ "game": index + 1, "result": result }),
            Err(e) => {
                failures += 1;
                error!(game = index + 1, error = %e, "Game analysis failed");
                json!({ "game": index + 1, "error": e.to_string() })
            }
        };
        reports.push(report);
    }

    match serde_json::to_string_pretty(&reports) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            error!(error = %e, "Failed to serialize results");
            process::exit(1);
        }
    }

    if failures > 0 {
        process::exit(1);
    }
}
