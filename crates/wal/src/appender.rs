//! Serialized group-commit appender.
//!
//! One dedicated writer thread owns the log file and drains a bounded MPSC
//! ring. Each drain pass becomes a single `write_all` + one `fsync`; every
//! caller queued into that pass unblocks with the same commit result. Under
//! load the batch grows to whatever is queued (up to `batch_max`), amortizing
//! the fsync; with a single caller the batch is just that record and commit
//! latency is one fsync.
//!
//! ## Commit sequence
//!
//! The writer assigns each record a sequence number equal to its position in
//! the file, and the caller receives it with the append acknowledgment.
//! Applying index updates in sequence order therefore reproduces exactly the
//! state a replay of the file would build.
//!
//! ## Backpressure and cancellation
//!
//! When the ring is full, [`WalAppender::append`] fails fast with
//! [`WalError::Backpressure`] rather than queueing unboundedly. Once a record
//! is enqueued it will be committed even if the caller goes away; dropping
//! the appender drains everything already queued before the writer exits.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::path::Path;
use std::thread::{self, JoinHandle};

use crate::{ScoreRecord, WalError, WalWriter};

/// Tuning for the group-commit ring.
#[derive(Debug, Clone, Copy)]
pub struct WalConfig {
    /// Capacity of the append ring. A full ring signals backpressure.
    /// Default: 4096.
    pub queue_depth: usize,

    /// Maximum records per group commit (one fsync). Default: 256.
    pub batch_max: usize,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            queue_depth: 4096,
            batch_max: 256,
        }
    }
}

enum Command {
    Append {
        record: ScoreRecord,
        done: Sender<Result<u64, WalError>>,
    },
    Truncate {
        done: Sender<Result<(), WalError>>,
    },
}

/// Handle to a shard's serialized WAL writer.
pub struct WalAppender {
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl WalAppender {
    /// Opens the log at `path` and spawns the writer thread.
    ///
    /// `next_seq` seeds the commit sequence — pass the number of records
    /// already in the file (i.e. what [`crate::replay`] returned), so that
    /// live commit sequences continue where replay left off.
    pub fn spawn<P: AsRef<Path>>(
        path: P,
        next_seq: u64,
        config: WalConfig,
    ) -> Result<Self, WalError> {
        // Open in the caller's thread so a bad path fails at construction.
        let writer = WalWriter::create(path)?;
        let (tx, rx) = bounded(config.queue_depth.max(1));
        let batch_max = config.batch_max.max(1);
        let handle = thread::Builder::new()
            .name("wal-appender".to_string())
            .spawn(move || writer_loop(writer, rx, next_seq, batch_max))?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Appends one record, blocking until the fsync covering it succeeds.
    ///
    /// Returns the record's commit sequence (its position in the file).
    /// Fails fast with [`WalError::Backpressure`] when the ring is full.
    pub fn append(&self, record: ScoreRecord) -> Result<u64, WalError> {
        let tx = self.tx.as_ref().ok_or(WalError::Closed)?;
        let (done_tx, done_rx) = bounded(1);
        match tx.try_send(Command::Append {
            record,
            done: done_tx,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(WalError::Backpressure),
            Err(TrySendError::Disconnected(_)) => return Err(WalError::Closed),
        }
        done_rx.recv().map_err(|_| WalError::Closed)?
    }

    /// Truncates the log to zero bytes, serialized behind every append
    /// already queued. Blocks until the truncation is durable.
    ///
    /// Not subject to backpressure: truncation is rare and must not be
    /// starved by a full ring.
    pub fn truncate(&self) -> Result<(), WalError> {
        let tx = self.tx.as_ref().ok_or(WalError::Closed)?;
        let (done_tx, done_rx) = bounded(1);
        tx.send(Command::Truncate { done: done_tx })
            .map_err(|_| WalError::Closed)?;
        done_rx.recv().map_err(|_| WalError::Closed)?
    }
}

impl Drop for WalAppender {
    fn drop(&mut self) {
        // Disconnecting the channel tells the writer to drain and exit.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn writer_loop(
    mut writer: WalWriter,
    rx: Receiver<Command>,
    mut next_seq: u64,
    batch_max: usize,
) {
    let mut records: Vec<ScoreRecord> = Vec::with_capacity(batch_max);
    let mut waiters: Vec<Sender<Result<u64, WalError>>> = Vec::with_capacity(batch_max);

    loop {
        let first = match rx.recv() {
            Ok(cmd) => cmd,
            Err(_) => break, // all senders gone: shutdown
        };

        let mut deferred_truncate = None;
        match first {
            Command::Truncate { done } => {
                let _ = done.send(writer.truncate());
                continue;
            }
            Command::Append { record, done } => {
                records.push(record);
                waiters.push(done);
            }
        }

        // Opportunistically drain the ring into this group commit.
        while records.len() < batch_max {
            match rx.try_recv() {
                Ok(Command::Append { record, done }) => {
                    records.push(record);
                    waiters.push(done);
                }
                Ok(Command::Truncate { done }) => {
                    deferred_truncate = Some(done);
                    break;
                }
                Err(_) => break,
            }
        }

        match writer.append_batch(&records) {
            Ok(()) => {
                for done in waiters.drain(..) {
                    next_seq += 1;
                    let _ = done.send(Ok(next_seq));
                }
            }
            Err(e) => {
                tracing::warn!(batch = records.len(), error = %e, "wal group commit failed");
                // Durable state of the batch is unknown; skip its sequence
                // range so later commits stay monotonic either way.
                next_seq += records.len() as u64;
                for done in waiters.drain(..) {
                    let _ = done.send(Err(e.clone()));
                }
            }
        }
        records.clear();

        if let Some(done) = deferred_truncate {
            let _ = done.send(writer.truncate());
        }
    }
}
