//! The per-game shard: one ranking index + one WAL, plus checkpointing.

use parking_lot::RwLock;
use ranking::RankingIndex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use wal::{WalAppender, WalConfig};

use crate::recovery::recover_index;
use crate::{EngineConfig, EngineError};

/// A per-game leaderboard: exclusive owner of its index and WAL.
///
/// Created by [`crate::Engine::shard`] on first access; recovery runs inside
/// [`Shard::open`], so a handle to a `Shard` is always READY. Shards live for
/// the rest of the process.
pub struct Shard {
    pub(crate) game_id: String,
    pub(crate) index: RwLock<RankingIndex>,
    pub(crate) wal: WalAppender,
    pub(crate) checkpoint_path: PathBuf,

    pub(crate) score_min: i64,
    pub(crate) score_max: i64,
    pub(crate) max_top_k: usize,
    checkpoint_every: u64,

    /// Writers hold the shared side across WAL append + index update;
    /// `checkpoint()` holds the exclusive side across snapshot + truncate so
    /// no acknowledged record can fall between the two.
    pub(crate) checkpoint_gate: RwLock<()>,
    pub(crate) writes_since_checkpoint: AtomicU64,
    checkpointing: AtomicBool,
}

impl Shard {
    /// Opens the shard for `game_id`, performing full recovery before any
    /// request can be served.
    pub(crate) fn open(game_id: &str, config: &EngineConfig) -> Result<Self, EngineError> {
        let wal_path = config.data_dir.join(format!("{game_id}.wal"));
        let checkpoint_path = config.data_dir.join(format!("{game_id}.checkpoint"));

        let started = Instant::now();

        // Recovery must finish before the appender opens the file, so that
        // replay sees a quiescent log.
        let (index, replayed) =
            recover_index(&wal_path, &checkpoint_path).map_err(|source| EngineError::Recovery {
                game_id: game_id.to_string(),
                source,
            })?;

        let wal = WalAppender::spawn(
            &wal_path,
            replayed,
            WalConfig {
                queue_depth: config.wal_queue_depth,
                batch_max: config.wal_batch_max,
            },
        )
        .map_err(|source| EngineError::Recovery {
            game_id: game_id.to_string(),
            source,
        })?;

        tracing::info!(
            game_id,
            users = index.len(),
            replayed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "shard recovered"
        );

        Ok(Self {
            game_id: game_id.to_string(),
            index: RwLock::new(index),
            wal,
            checkpoint_path,
            score_min: config.score_min,
            score_max: config.score_max,
            max_top_k: config.max_top_k,
            checkpoint_every: config.checkpoint_every,
            checkpoint_gate: RwLock::new(()),
            writes_since_checkpoint: AtomicU64::new(0),
            checkpointing: AtomicBool::new(false),
        })
    }

    /// The game this shard serves.
    #[must_use]
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Number of distinct users on the leaderboard.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Writes a compacted snapshot of the current `user -> score` state and
    /// truncates the live WAL.
    ///
    /// Holds the checkpoint gate exclusively, so in-flight writes finish
    /// first and new ones wait; the snapshot therefore covers every record
    /// the truncation discards.
    ///
    /// # Errors
    ///
    /// Checkpoint or truncation I/O failures are retryable: the WAL keeps its
    /// records and a snapshot plus an un-truncated WAL still recovers to the
    /// same state.
    pub fn checkpoint(&self) -> Result<(), EngineError> {
        let _gate = self.checkpoint_gate.write();

        let entries: Vec<(String, i64)> = {
            let index = self.index.read();
            index.iter().map(|(u, s)| (u.to_string(), s)).collect()
        };

        wal::checkpoint::write(&self.checkpoint_path, &entries).map_err(EngineError::Retryable)?;
        self.wal.truncate().map_err(EngineError::Retryable)?;
        self.writes_since_checkpoint.store(0, Ordering::Relaxed);

        tracing::info!(game_id = %self.game_id, users = entries.len(), "checkpoint written");
        Ok(())
    }

    /// Auto-checkpoint trigger, called after each accepted write. Skipped
    /// when disabled, below the cadence, or already running.
    pub(crate) fn maybe_checkpoint(&self) {
        if self.checkpoint_every == 0 {
            return;
        }
        if self.writes_since_checkpoint.load(Ordering::Relaxed) < self.checkpoint_every {
            return;
        }
        if self
            .checkpointing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        if let Err(e) = self.checkpoint() {
            tracing::warn!(game_id = %self.game_id, error = %e, "auto checkpoint failed");
        }
        self.checkpointing.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("game_id", &self.game_id)
            .field("users", &self.len())
            .field("score_min", &self.score_min)
            .field("score_max", &self.score_max)
            .field("max_top_k", &self.max_top_k)
            .field(
                "writes_since_checkpoint",
                &self.writes_since_checkpoint.load(Ordering::Relaxed),
            )
            .finish()
    }
}
