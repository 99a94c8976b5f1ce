/// Cold-start recovery: checkpoint load + WAL replay.
///
/// Builds a fresh ranking index from the shard's on-disk state. The
/// checkpoint (if present and valid) seeds the index; the WAL is then
/// replayed on top in file order, last write per user winning. Returns the
/// rebuilt index together with the replayed record count, which seeds the
/// live appender's commit sequence.
use ranking::RankingIndex;
use std::path::Path;
use wal::WalError;

/// Replays a shard's durable state into a fresh index.
///
/// # Errors
///
/// Fails on checkpoint validation errors and on WAL open/read errors — both
/// block the shard from reaching READY. Malformed WAL lines from a crash
/// truncation are skipped inside [`wal::replay`], not surfaced here.
pub fn recover_index(
    wal_path: &Path,
    checkpoint_path: &Path,
) -> Result<(RankingIndex, u64), WalError> {
    let mut index = RankingIndex::new();

    // Checkpoint entries carry sequence 0 so any WAL record overrides them.
    if let Some(entries) = wal::checkpoint::read(checkpoint_path)? {
        for (user_id, score) in &entries {
            index.upsert(user_id, *score, 0);
        }
    }

    let replayed = wal::replay(wal_path, |seq, record| {
        index.upsert(&record.user_id, record.score, seq);
    })?;

    Ok((index, replayed))
}
