use std::path::PathBuf;

/// Engine configuration with production defaults.
///
/// One value is shared by every shard the registry creates.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding `<game_id>.wal` and `<game_id>.checkpoint` files.
    /// Created (`mkdir -p`) by [`crate::Engine::new`]; failure to create it
    /// is fatal at startup. Default: `./data`.
    pub data_dir: PathBuf,

    /// Inclusive score bounds enforced on submission. The engine is
    /// score-agnostic beyond this range check.
    /// Defaults: `0` and `i64::MAX` (non-negative, application-bounded).
    pub score_min: i64,
    pub score_max: i64,

    /// Largest `k` a top-K read may request. Larger requests are rejected as
    /// invalid input rather than silently clamped. Default: 1000.
    pub max_top_k: usize,

    /// Capacity of each shard's WAL append ring; a full ring surfaces as a
    /// retryable write failure. Default: 4096.
    pub wal_queue_depth: usize,

    /// Maximum records folded into one WAL group commit (one fsync).
    /// Default: 256.
    pub wal_batch_max: usize,

    /// Accepted writes between automatic checkpoints; bounds WAL replay work
    /// on cold recovery. `0` disables auto-checkpointing.
    /// Default: 500_000.
    pub checkpoint_every: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            score_min: 0,
            score_max: i64::MAX,
            max_top_k: 1000,
            wal_queue_depth: 4096,
            wal_batch_max: 256,
            checkpoint_every: 500_000,
        }
    }
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }
}
