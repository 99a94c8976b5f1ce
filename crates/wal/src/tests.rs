use super::*;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn record(user: &str, score: i64, ctime_ms: u64) -> ScoreRecord {
    ScoreRecord {
        user_id: user.to_string(),
        score,
        ctime_ms,
    }
}

fn replay_all(path: &std::path::Path) -> Vec<(u64, ScoreRecord)> {
    let mut out = Vec::new();
    replay(path, |seq, rec| out.push((seq, rec))).unwrap();
    out
}

// -------------------- Basic write & replay --------------------

#[test]
fn write_and_replay_batch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");

    let mut w = WalWriter::create(&path).unwrap();
    w.append_batch(&[
        record("u1", 10, 1000),
        record("u2", 20, 1001),
        record("u1", 30, 1002),
    ])
    .unwrap();

    let recs = replay_all(&path);
    assert_eq!(
        recs,
        vec![
            (1, record("u1", 10, 1000)),
            (2, record("u2", 20, 1001)),
            (3, record("u1", 30, 1002)),
        ]
    );
}

#[test]
fn roundtrip_preserves_ctime_millis() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");

    let rec = record("player-9", -5, 1_700_000_123_456);
    let mut w = WalWriter::create(&path).unwrap();
    w.append_batch(std::slice::from_ref(&rec)).unwrap();

    let recs = replay_all(&path);
    assert_eq!(recs, vec![(1, rec)]);
}

#[test]
fn replay_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    assert!(replay_all(&dir.path().join("absent.wal")).is_empty());
}

#[test]
fn replay_empty_file_is_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");
    fs::write(&path, b"").unwrap();
    assert!(replay_all(&path).is_empty());
}

// -------------------- Truncated tail tolerance --------------------

#[test]
fn unterminated_tail_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");

    let mut w = WalWriter::create(&path).unwrap();
    w.append_batch(&[record("u1", 1, 1), record("u2", 2, 2)])
        .unwrap();
    drop(w);

    // Torn write: a line that parses but lost its newline in the crash.
    let mut data = fs::read(&path).unwrap();
    data.extend_from_slice(b"u3\t42\t9");
    fs::write(&path, &data).unwrap();

    let recs = replay_all(&path);
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[1].1, record("u2", 2, 2));
}

#[test]
fn malformed_line_is_skipped_and_replay_continues() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");
    fs::write(&path, b"u1\t5\t100\nnot a record\nu2\t6\t101\n").unwrap();

    let recs = replay_all(&path);
    assert_eq!(
        recs,
        vec![(1, record("u1", 5, 100)), (2, record("u2", 6, 101))]
    );
}

#[test]
fn non_utf8_tail_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");
    fs::write(&path, b"u1\t5\t100\n\xff\xfe\xfd\n").unwrap();

    let recs = replay_all(&path);
    assert_eq!(recs, vec![(1, record("u1", 5, 100))]);
}

#[test]
fn wrong_field_count_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");
    fs::write(&path, b"u1\t5\nu2\t6\t101\t999\nu3\t7\t102\n").unwrap();

    let recs = replay_all(&path);
    assert_eq!(recs, vec![(1, record("u3", 7, 102))]);
}

// -------------------- Group-commit appender --------------------

#[test]
fn appender_assigns_file_order_sequences() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");

    let appender = WalAppender::spawn(&path, 0, WalConfig::default()).unwrap();
    for i in 1..=5i64 {
        let seq = appender.append(record(&format!("u{}", i), i, 0)).unwrap();
        assert_eq!(seq, i as u64);
    }
    drop(appender);

    let recs = replay_all(&path);
    assert_eq!(recs.len(), 5);
    for (i, (seq, rec)) in recs.iter().enumerate() {
        assert_eq!(*seq, (i + 1) as u64);
        assert_eq!(rec.user_id, format!("u{}", i + 1));
    }
}

#[test]
fn appender_continues_sequence_after_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");

    {
        let appender = WalAppender::spawn(&path, 0, WalConfig::default()).unwrap();
        appender.append(record("u1", 1, 0)).unwrap();
        appender.append(record("u2", 2, 0)).unwrap();
    }

    let replayed = replay(&path, |_, _| {}).unwrap();
    assert_eq!(replayed, 2);

    let appender = WalAppender::spawn(&path, replayed, WalConfig::default()).unwrap();
    assert_eq!(appender.append(record("u3", 3, 0)).unwrap(), 3);
}

#[test]
fn concurrent_appends_are_all_durable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");

    let appender = Arc::new(WalAppender::spawn(&path, 0, WalConfig::default()).unwrap());

    let mut handles = Vec::new();
    for t in 0..4 {
        let appender = Arc::clone(&appender);
        handles.push(thread::spawn(move || {
            let mut seqs = Vec::new();
            for i in 0..50 {
                let user = format!("t{}-{}", t, i);
                seqs.push(appender.append(record(&user, i, 0)).unwrap());
            }
            seqs
        }));
    }

    let mut all_seqs: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all_seqs.sort_unstable();
    let expected: Vec<u64> = (1..=200).collect();
    assert_eq!(all_seqs, expected, "commit sequences must be unique and gapless");

    drop(appender);
    assert_eq!(replay_all(&path).len(), 200);
}

#[test]
fn truncate_is_serialized_behind_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.wal");

    let appender = WalAppender::spawn(&path, 0, WalConfig::default()).unwrap();
    for i in 0..3 {
        appender.append(record(&format!("u{}", i), i, 0)).unwrap();
    }
    appender.truncate().unwrap();
    assert_eq!(appender.append(record("after", 9, 0)).unwrap(), 4);
    drop(appender);

    let recs = replay_all(&path);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].1.user_id, "after");
}

// -------------------- Checkpoint --------------------

#[test]
fn checkpoint_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.checkpoint");

    let entries = vec![
        ("alice".to_string(), 120i64),
        ("bob".to_string(), 90),
        ("carol".to_string(), -3),
    ];
    checkpoint::write(&path, &entries).unwrap();

    let loaded = checkpoint::read(&path).unwrap().unwrap();
    assert_eq!(loaded, entries);
}

#[test]
fn checkpoint_missing_is_none() {
    let dir = tempdir().unwrap();
    assert!(checkpoint::read(&dir.path().join("absent.checkpoint"))
        .unwrap()
        .is_none());
}

#[test]
fn checkpoint_empty_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.checkpoint");
    checkpoint::write(&path, &[]).unwrap();
    assert_eq!(checkpoint::read(&path).unwrap().unwrap(), vec![]);
}

#[test]
fn checkpoint_bad_magic_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.checkpoint");
    fs::write(&path, b"NOTMAGIC\x00\x00\x00\x00\x00\x00\x00\x00").unwrap();

    let result = checkpoint::read(&path);
    assert!(matches!(result, Err(WalError::CorruptCheckpoint(_))));
}

#[test]
fn checkpoint_crc_flip_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.checkpoint");
    checkpoint::write(&path, &[("alice".to_string(), 120)]).unwrap();

    // Flip a byte in the body.
    let mut data = fs::read(&path).unwrap();
    let last = data.len() - 1;
    data[last] ^= 0xFF;
    fs::write(&path, &data).unwrap();

    let result = checkpoint::read(&path);
    assert!(matches!(result, Err(WalError::CorruptCheckpoint(_))));
}

#[test]
fn checkpoint_truncation_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.checkpoint");
    checkpoint::write(&path, &[("alice".to_string(), 120), ("bob".to_string(), 90)]).unwrap();

    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() - 4]).unwrap();

    let result = checkpoint::read(&path);
    assert!(matches!(result, Err(WalError::CorruptCheckpoint(_))));
}

#[test]
fn checkpoint_trailing_bytes_are_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.checkpoint");
    checkpoint::write(&path, &[("alice".to_string(), 120)]).unwrap();

    let mut data = fs::read(&path).unwrap();
    data.push(0xAB);
    fs::write(&path, &data).unwrap();

    let result = checkpoint::read(&path);
    assert!(matches!(result, Err(WalError::CorruptCheckpoint(_))));
}

#[test]
fn checkpoint_leaves_no_tmp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("game.checkpoint");
    checkpoint::write(&path, &[("alice".to_string(), 1)]).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["game.checkpoint".to_string()]);
}
