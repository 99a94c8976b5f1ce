//! Compacted snapshot of a shard's `user -> score` state.
//!
//! A checkpoint bounds recovery work: load the snapshot, then replay only the
//! WAL records written after it. The file is binary with per-record CRC32
//! framing so that recovery can tell a valid snapshot from a damaged one —
//! unlike the live WAL, a checkpoint is only ever trusted whole.
//!
//! ## File Format
//!
//! ```text
//! [magic: "LBCHKPT1"][count: u64 LE]
//! then `count` frames of:
//! [len: u32 LE][crc32: u32 LE][body: score i64 LE + user_id bytes]
//! ```
//!
//! `len` is the body length; the CRC covers the body. The file is written to
//! a `.tmp` sibling, fsynced, renamed into place, and the directory fsynced —
//! a crash mid-checkpoint leaves the previous snapshot (or none) intact.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::WalError;

const MAGIC: &[u8; 8] = b"LBCHKPT1";

/// Sanity cap on a single frame; anything larger is corruption.
const MAX_FRAME_SIZE: u32 = 1024 * 1024;

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn corrupt(reason: &str) -> WalError {
    WalError::CorruptCheckpoint(reason.to_string())
}

/// Maps an unexpected EOF to corruption: checkpoints are written whole, so a
/// short read means the file is not a valid snapshot.
fn read_err(e: io::Error) -> WalError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        corrupt("truncated file")
    } else {
        e.into()
    }
}

/// Atomically writes `entries` as the shard's checkpoint at `path`.
pub fn write(path: &Path, entries: &[(String, i64)]) -> Result<(), WalError> {
    let tmp = tmp_path(path);
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        w.write_all(MAGIC)?;
        w.write_u64::<LittleEndian>(entries.len() as u64)?;

        let mut body = Vec::with_capacity(64);
        for (user_id, score) in entries {
            body.clear();
            body.write_i64::<LittleEndian>(*score)?;
            body.extend_from_slice(user_id.as_bytes());

            let mut hasher = Crc32::new();
            hasher.update(&body);
            let crc = hasher.finalize();

            w.write_u32::<LittleEndian>(body.len() as u32)?;
            w.write_u32::<LittleEndian>(crc)?;
            w.write_all(&body)?;
        }
        w.flush()?;
        w.get_ref().sync_all()?;
    }

    fs::rename(&tmp, path)?;
    if let Some(dir) = path.parent() {
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

/// Loads and validates the checkpoint at `path`.
///
/// Returns `Ok(None)` when no checkpoint exists. Any framing, CRC, count, or
/// encoding mismatch is [`WalError::CorruptCheckpoint`] — the caller must not
/// serve from a snapshot that fails validation.
pub fn read(path: &Path) -> Result<Option<Vec<(String, i64)>>, WalError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).map_err(read_err)?;
    if &magic != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let count = reader.read_u64::<LittleEndian>().map_err(read_err)?;

    let mut entries = Vec::with_capacity(count.min(1 << 20) as usize);
    let mut body = Vec::with_capacity(64);
    for _ in 0..count {
        let len = reader.read_u32::<LittleEndian>().map_err(read_err)?;
        if len <= 8 || len > MAX_FRAME_SIZE {
            return Err(corrupt("bad frame length"));
        }
        let crc = reader.read_u32::<LittleEndian>().map_err(read_err)?;

        body.clear();
        body.resize(len as usize, 0);
        reader.read_exact(&mut body).map_err(read_err)?;

        let mut hasher = Crc32::new();
        hasher.update(&body);
        if hasher.finalize() != crc {
            return Err(corrupt("crc mismatch"));
        }

        let score = (&body[..8]).read_i64::<LittleEndian>()?;
        let user_id = std::str::from_utf8(&body[8..])
            .map_err(|_| corrupt("non-utf8 user id"))?
            .to_string();
        entries.push((user_id, score));
    }

    // A valid snapshot ends exactly at the last frame.
    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        return Err(corrupt("trailing bytes"));
    }

    Ok(Some(entries))
}
