/// Read path: top_k(), rank_of(), and score_of().
///
/// Reads delegate to the ranking index under the shared lock and never touch
/// the WAL. Each call observes a consistent snapshot of the index as of lock
/// acquisition; reads are serializable with respect to completed writes.
use crate::{EngineError, LeaderboardRow, Shard};

impl Shard {
    /// Returns up to `k` rows in ranking order, ranks starting at 1.
    ///
    /// `k = 0` returns an empty list, as does an empty shard. Requests above
    /// the configured `max_top_k` are rejected as invalid input.
    pub fn top_k(&self, k: usize) -> Result<Vec<LeaderboardRow>, EngineError> {
        if k > self.max_top_k {
            return Err(EngineError::invalid(format!(
                "k {} exceeds configured maximum {}",
                k, self.max_top_k
            )));
        }

        let index = self.index.read();
        Ok(index
            .top_k(k)
            .into_iter()
            .map(|entry| LeaderboardRow {
                user_id: entry.user_id,
                score: entry.score,
                rank: entry.rank,
                game_id: self.game_id.clone(),
            })
            .collect())
    }

    /// 1-based rank of `user_id`, or `None` if the user has no score.
    pub fn rank_of(&self, user_id: &str) -> Option<u64> {
        self.index.read().rank_of(user_id)
    }

    /// Current score of `user_id`, or `None` if the user has no score.
    pub fn score_of(&self, user_id: &str) -> Option<i64> {
        self.index.read().score_of(user_id)
    }
}
