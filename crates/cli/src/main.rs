///! # CLI - Leaderboard Interactive Shell
///!
///! A REPL-style command-line interface for the leaderboard engine. Reads
///! commands from stdin, executes them against the engine, and prints results
///! to stdout. Designed for both interactive use and scripted testing (pipe
///! commands via stdin).
///!
///! ## Commands
///!
///! ```text
///! SUBMIT game user score   Submit (or overwrite) a user's score
///! TOP game k               Top-K rows in ranking order
///! RANK game user           1-based rank of a user
///! SCORE game user          Current score of a user
///! CHECKPOINT game          Compact the game's WAL into a snapshot
///! STATS game               Print shard debug info
///! EXIT / QUIT              Shut down gracefully
///! ```
///!
///! ## Configuration
///!
///! All settings are controlled via environment variables:
///!
///! ```text
///! LEADERBOARD_DATA_DIR          WAL/checkpoint directory   (default: "data")
///! LEADERBOARD_SCORE_MIN         Minimum accepted score     (default: 0)
///! LEADERBOARD_SCORE_MAX         Maximum accepted score     (default: i64::MAX)
///! LEADERBOARD_MAX_TOP_K         Largest allowed top-K      (default: 1000)
///! LEADERBOARD_WAL_QUEUE         Append ring capacity       (default: 4096)
///! LEADERBOARD_WAL_BATCH         Max records per fsync      (default: 256)
///! LEADERBOARD_CHECKPOINT_EVERY  Auto-checkpoint cadence    (default: 500000, 0 = off)
///! ```
///!
///! ## Example
///!
///! ```text
///! $ cargo run -p cli
///! leaderboard engine started (data_dir=data, max_top_k=1000)
///! > SUBMIT space-race alice 120
///! ACCEPTED
///! > TOP space-race 3
///! 1. alice 120
///! (1 rows)
///! > EXIT
///! bye
///! ```

use anyhow::Result;
use engine::{Engine, EngineConfig, EngineError, ScoreUpdate};
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn config_from_env() -> EngineConfig {
    let mut config = EngineConfig::new(env_or("LEADERBOARD_DATA_DIR", "data"));
    config.score_min = env_or("LEADERBOARD_SCORE_MIN", "0")
        .parse()
        .unwrap_or(config.score_min);
    config.score_max = env_or("LEADERBOARD_SCORE_MAX", "")
        .parse()
        .unwrap_or(config.score_max);
    config.max_top_k = env_or("LEADERBOARD_MAX_TOP_K", "1000")
        .parse()
        .unwrap_or(config.max_top_k);
    config.wal_queue_depth = env_or("LEADERBOARD_WAL_QUEUE", "4096")
        .parse()
        .unwrap_or(config.wal_queue_depth);
    config.wal_batch_max = env_or("LEADERBOARD_WAL_BATCH", "256")
        .parse()
        .unwrap_or(config.wal_batch_max);
    config.checkpoint_every = env_or("LEADERBOARD_CHECKPOINT_EVERY", "500000")
        .parse()
        .unwrap_or(config.checkpoint_every);
    config
}

/// Maps an engine error to a one-line response, keeping the retryable class
/// visually distinct (the 503 + Retry-After family at an HTTP seam).
fn print_err(e: EngineError) {
    if e.is_retryable() {
        println!("ERR busy, retry: {}", e);
    } else {
        println!("ERR {}", e);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = config_from_env();
    // Startup faults (unusable data directory) propagate: non-zero exit.
    let engine = Engine::new(config)?;

    println!(
        "leaderboard engine started (data_dir={}, max_top_k={})",
        engine.config().data_dir.display(),
        engine.config().max_top_k
    );
    println!("Commands: SUBMIT game user score | TOP game k | RANK game user");
    println!("          SCORE game user | CHECKPOINT game | STATS game | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SUBMIT" => {
                    match (parts.next(), parts.next(), parts.next().map(str::parse)) {
                        (Some(game), Some(user), Some(Ok(score))) => {
                            match engine
                                .shard(game)
                                .and_then(|s| s.update_score(&ScoreUpdate::new(user, game, score)))
                            {
                                Ok(()) => println!("ACCEPTED"),
                                Err(e) => print_err(e),
                            }
                        }
                        _ => println!("ERR usage: SUBMIT game user score"),
                    }
                }
                "TOP" => match (parts.next(), parts.next().map(str::parse)) {
                    (Some(game), Some(Ok(k))) => {
                        match engine.shard(game).and_then(|s| s.top_k(k)) {
                            Ok(rows) => {
                                for row in &rows {
                                    println!("{}. {} {}", row.rank, row.user_id, row.score);
                                }
                                println!("({} rows)", rows.len());
                            }
                            Err(e) => print_err(e),
                        }
                    }
                    _ => println!("ERR usage: TOP game k"),
                },
                "RANK" => match (parts.next(), parts.next()) {
                    (Some(game), Some(user)) => match engine.shard(game) {
                        Ok(shard) => match shard.rank_of(user) {
                            Some(rank) => println!("{}", rank),
                            None => println!("(not found)"),
                        },
                        Err(e) => print_err(e),
                    },
                    _ => println!("ERR usage: RANK game user"),
                },
                "SCORE" => match (parts.next(), parts.next()) {
                    (Some(game), Some(user)) => match engine.shard(game) {
                        Ok(shard) => match shard.score_of(user) {
                            Some(score) => println!("{}", score),
                            None => println!("(not found)"),
                        },
                        Err(e) => print_err(e),
                    },
                    _ => println!("ERR usage: SCORE game user"),
                },
                "CHECKPOINT" => match parts.next() {
                    Some(game) => match engine.shard(game).and_then(|s| s.checkpoint()) {
                        Ok(()) => println!("OK"),
                        Err(e) => print_err(e),
                    },
                    None => println!("ERR usage: CHECKPOINT game"),
                },
                "STATS" => match parts.next() {
                    Some(game) => match engine.shard(game) {
                        Ok(shard) => println!("{:?}", shard),
                        Err(e) => print_err(e),
                    },
                    None => println!("ERR usage: STATS game"),
                },
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
