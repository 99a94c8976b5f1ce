/// Write path: validation and the WAL-first update protocol.
///
/// All mutations flow through this module. Each accepted update is appended
/// to the shard's WAL (group-committed, fsynced) and only then applied to the
/// ranking index, carrying the WAL-assigned commit sequence so concurrent
/// writers converge to WAL order.
use std::sync::atomic::Ordering;
use wal::ScoreRecord;

use crate::{EngineError, ScoreUpdate, Shard};

impl Shard {
    /// Accepts a score submission.
    ///
    /// # Protocol
    ///
    /// 1. Validate identifiers and score bounds.
    /// 2. Append to the WAL; a failure is returned as
    ///    [`EngineError::Retryable`] and the index is untouched.
    /// 3. Apply to the index with the WAL commit sequence.
    ///
    /// A successful return means the update is durable and visible to reads.
    pub fn update_score(&self, update: &ScoreUpdate) -> Result<(), EngineError> {
        validate_user_id(&update.user_id)?;
        if update.game_id.is_empty() {
            return Err(EngineError::invalid("game_id must not be empty"));
        }
        if update.game_id != self.game_id {
            return Err(EngineError::invalid(format!(
                "game_id {:?} does not match shard {:?}",
                update.game_id, self.game_id
            )));
        }
        if update.score < self.score_min || update.score > self.score_max {
            return Err(EngineError::invalid(format!(
                "score {} outside configured bounds [{}, {}]",
                update.score, self.score_min, self.score_max
            )));
        }

        let gate = self.checkpoint_gate.read();

        let seq = self
            .wal
            .append(ScoreRecord {
                user_id: update.user_id.clone(),
                score: update.score,
                ctime_ms: update.ctime_ms,
            })
            .map_err(EngineError::Retryable)?;

        self.index.write().upsert(&update.user_id, update.score, seq);

        drop(gate);

        self.writes_since_checkpoint.fetch_add(1, Ordering::Relaxed);
        self.maybe_checkpoint();

        Ok(())
    }
}

/// A user id must be non-empty and free of the WAL's delimiter alphabet
/// (TAB, CR, LF), which keeps the record format unambiguous for arbitrary
/// identifiers.
pub(crate) fn validate_user_id(user_id: &str) -> Result<(), EngineError> {
    if user_id.is_empty() {
        return Err(EngineError::invalid("user_id must not be empty"));
    }
    if user_id.contains(['\t', '\n', '\r']) {
        return Err(EngineError::invalid(
            "user_id must not contain tab or newline characters",
        ));
    }
    Ok(())
}
