use std::path::PathBuf;
use thiserror::Error;
use wal::WalError;

/// Error taxonomy of the engine's public API.
///
/// Absent users on rank/score queries are not errors — those return `None`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed caller input: empty identifier, delimiter bytes
    /// in a user id, out-of-range score, oversized top-K request. Never
    /// retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transient write failure (WAL append or checkpoint I/O). The index was
    /// not touched; the caller may retry.
    #[error("write temporarily unavailable: {0}")]
    Retryable(#[source] WalError),

    /// The shard failed recovery and never reached READY.
    #[error("recovery failed for game {game_id}: {source}")]
    Recovery {
        game_id: String,
        #[source]
        source: WalError,
    },

    /// The data directory could not be created at startup.
    #[error("data directory {path:?} is unusable: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    /// True for failures worth retrying after a short backoff (the 503 +
    /// Retry-After class at an HTTP seam).
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Retryable(_))
    }
}
