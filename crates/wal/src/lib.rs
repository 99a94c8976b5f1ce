//! # WAL — Write-Ahead Log
//!
//! Crash-safe durability for a leaderboard shard. Every accepted score update
//! is appended to the shard's log **before** the in-memory ranking index is
//! touched. On restart the log is replayed to reconstruct the index,
//! guaranteeing that no acknowledged write is lost.
//!
//! ## Record Format
//!
//! One record per line, TAB-delimited:
//!
//! ```text
//! <user_id>\t<score>\t<ctime_epoch_millis>\n
//! ```
//!
//! The delimiter is kept unambiguous by construction: callers must reject
//! user ids containing TAB, CR, or LF before a record reaches the log. The
//! game id is implied by the filename (`<data>/<game_id>.wal`) and never
//! stored in the record.
//!
//! ## Durability
//!
//! Appends go through [`WalAppender`], a single writer thread fed by a
//! bounded ring. The thread drains whatever is queued, writes the batch with
//! one `write_all`, and issues one `fsync` for the whole group; every caller
//! unblocks only once the fsync covering its bytes has succeeded. See
//! [`appender`] for the commit-sequence contract.
//!
//! ## Replay
//!
//! [`replay`] yields records in file order. A truncated or otherwise
//! malformed line (crash mid-write) is skipped with a warning — all complete
//! records around it are still returned. A missing file is an empty log.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;

pub mod appender;
pub mod checkpoint;

pub use appender::{WalAppender, WalConfig};

/// A single accepted score update, as recorded in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    /// Opaque user identifier; never contains TAB, CR, or LF.
    pub user_id: String,
    /// The submitted score.
    pub score: i64,
    /// Wall-clock acceptance time in milliseconds since the Unix epoch.
    /// Recorded for operators; never used for ordering.
    pub ctime_ms: u64,
}

/// Errors that can occur during WAL operations.
///
/// `Clone` so that a group-commit failure can be fanned out to every caller
/// waiting on the same fsync.
#[derive(Debug, Clone, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error ({kind:?}): {message}")]
    Io {
        kind: io::ErrorKind,
        message: String,
    },

    /// The append ring is full; the caller should back off and retry.
    #[error("append ring full")]
    Backpressure,

    /// The appender has shut down; no further appends are possible.
    #[error("wal appender is shut down")]
    Closed,

    /// The checkpoint file failed integrity validation.
    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),
}

impl From<io::Error> for WalError {
    fn from(e: io::Error) -> Self {
        WalError::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

fn encode_record(buf: &mut Vec<u8>, record: &ScoreRecord) {
    buf.extend_from_slice(record.user_id.as_bytes());
    buf.push(b'\t');
    buf.extend_from_slice(record.score.to_string().as_bytes());
    buf.push(b'\t');
    buf.extend_from_slice(record.ctime_ms.to_string().as_bytes());
    buf.push(b'\n');
}

fn parse_line(line: &str) -> Option<ScoreRecord> {
    let mut fields = line.split('\t');
    let user_id = fields.next()?;
    let score = fields.next()?.parse().ok()?;
    let ctime_ms = fields.next()?.parse().ok()?;
    if user_id.is_empty() || fields.next().is_some() {
        return None;
    }
    Some(ScoreRecord {
        user_id: user_id.to_string(),
        score,
        ctime_ms,
    })
}

/// Low-level append-only writer. All appends are batched into a single
/// `write_all` followed by `sync_all()` — callers get durability, not
/// buffering. Production code drives this through [`WalAppender`]; tests may
/// use it directly.
pub struct WalWriter {
    file: File,
    /// Reusable scratch buffer to avoid allocation on every batch.
    buf: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        Ok(Self {
            file,
            buf: Vec::with_capacity(256),
        })
    }

    /// Serializes `records`, writes them in one call, and fsyncs.
    ///
    /// Returns only after `sync_all()` has succeeded; on error the durable
    /// state of the batch is unknown and none of it may be acknowledged.
    pub fn append_batch(&mut self, records: &[ScoreRecord]) -> Result<(), WalError> {
        self.buf.clear();
        for record in records {
            encode_record(&mut self.buf, record);
        }
        self.file.write_all(&self.buf)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncates the log to zero bytes (after a checkpoint has captured its
    /// contents) and fsyncs the truncation.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Replays every valid record in the WAL at `path`, calling `apply` with the
/// record's 1-based commit sequence and the record itself, in file order.
///
/// Returns the number of valid records replayed.
///
/// # Termination
///
/// - **Missing file** -> `Ok(0)` (fresh shard).
/// - **Malformed line** (torn write, bad field count, non-UTF-8 bytes, or a
///   tail with no trailing newline) -> skipped with a warning; replay
///   continues. A line without its newline was never covered by a successful
///   fsync, so nothing acknowledged is ever skipped.
/// - **I/O error** -> returned to the caller.
pub fn replay<P, F>(path: P, mut apply: F) -> Result<u64, WalError>
where
    P: AsRef<Path>,
    F: FnMut(u64, ScoreRecord),
{
    let file = match File::open(path.as_ref()) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);

    let mut seq = 0u64;
    let mut line_no = 0usize;
    let mut buf = Vec::with_capacity(128);
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        line_no += 1;

        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
        }
        if buf.is_empty() {
            continue;
        }

        let parsed = if terminated {
            std::str::from_utf8(&buf).ok().and_then(parse_line)
        } else {
            // Unterminated tail: torn write, never acknowledged.
            None
        };

        match parsed {
            Some(record) => {
                seq += 1;
                apply(seq, record);
            }
            None => {
                tracing::warn!(line = line_no, "skipping malformed wal record");
            }
        }
    }

    Ok(seq)
}

#[cfg(test)]
mod tests;
