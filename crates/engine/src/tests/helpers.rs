use crate::{EngineConfig, EngineError, ScoreUpdate, Shard};
use std::path::Path;

/// Config rooted in a test directory, with defaults otherwise.
pub fn config(dir: &Path) -> EngineConfig {
    EngineConfig::new(dir)
}

/// Submits a score for `user` to `shard`, stamping the current time.
pub fn submit(shard: &Shard, user: &str, score: i64) -> Result<(), EngineError> {
    shard.update_score(&ScoreUpdate::new(user, shard.game_id(), score))
}
