//! Process-wide registry: `game_id → Shard`, lazily instantiated.
//!
//! `Engine::shard` is idempotent and returns the same handle for the same id
//! for the life of the process. Concurrent first-gets for one id are
//! single-flighted through a per-game init lock, so exactly one recovery runs
//! and everyone else blocks until the shard is READY. Shards are never
//! destroyed mid-lifetime; games are fully independent of each other.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, OnceLock};

use crate::{EngineConfig, EngineError, Shard};

#[derive(Default)]
struct ShardCell {
    init: Mutex<()>,
    shard: OnceLock<Arc<Shard>>,
}

/// The engine: sole lifecycle owner of every [`Shard`].
pub struct Engine {
    config: EngineConfig,
    shards: RwLock<HashMap<String, Arc<ShardCell>>>,
}

impl Engine {
    /// Creates the engine and its data directory.
    ///
    /// # Errors
    ///
    /// [`EngineError::DataDir`] when the directory cannot be created — an
    /// unrecoverable startup fault the process should exit on.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        fs::create_dir_all(&config.data_dir).map_err(|source| EngineError::DataDir {
            path: config.data_dir.clone(),
            source,
        })?;
        Ok(Self {
            config,
            shards: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the shard for `game_id`, constructing and recovering it on
    /// first access.
    ///
    /// Blocks while another caller is recovering the same shard. A failed
    /// recovery is not cached — the next call retries it.
    pub fn shard(&self, game_id: &str) -> Result<Arc<Shard>, EngineError> {
        validate_game_id(game_id)?;

        let cell = {
            let shards = self.shards.read();
            shards.get(game_id).cloned()
        };
        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut shards = self.shards.write();
                shards.entry(game_id.to_string()).or_default().clone()
            }
        };

        if let Some(shard) = cell.shard.get() {
            return Ok(Arc::clone(shard));
        }

        let _init = cell.init.lock();
        if let Some(shard) = cell.shard.get() {
            return Ok(Arc::clone(shard));
        }

        let shard = Arc::new(Shard::open(game_id, &self.config)?);
        let _ = cell.shard.set(Arc::clone(&shard));
        Ok(shard)
    }

    /// The configuration every shard is created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// A game id names the shard's files (`<data>/<game_id>.wal`), so ids that
/// would escape the data directory are rejected.
fn validate_game_id(game_id: &str) -> Result<(), EngineError> {
    if game_id.is_empty() {
        return Err(EngineError::invalid("game_id must not be empty"));
    }
    if game_id == "." || game_id == ".." {
        return Err(EngineError::invalid("game_id must not be a dot path"));
    }
    if game_id.contains(['/', '\\', '\0']) {
        return Err(EngineError::invalid(
            "game_id must not contain path separators",
        ));
    }
    Ok(())
}
