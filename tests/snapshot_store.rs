// tests/snapshot_store.rs
//
// Run just this file:
//   cargo test --test snapshot_store -- --nocapture
//
// Covers:
// 1) put/close/reopen, last write wins, key order.
// 2) Segment rollover and MANIFEST.
// 3) Corruption under a MANIFEST is a StoreOpen error; a partial tail without MANIFEST is dropped.
// 4) Write store preconditions: empty dir, single writer.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use diffarchive::error::{kind_of, ErrorKind};
use diffarchive::store::manifest::read_manifest;
use diffarchive::store::{ReadStore, WriteStore, MANIFEST_FILE};
use diffarchive::SFile;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("datest-store-{prefix}-{pid}-{t}-{id}"))
}

fn sf(path: &str, size: i64, mtime: i64) -> SFile {
    SFile {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        size,
        mtime,
    }
}

#[test]
fn put_close_reopen_last_write_wins() -> Result<()> {
    let dir = unique_root("basic");

    let mut w = WriteStore::create(&dir)?;
    w.put("b/two.txt", &sf("b/two.txt", 2, 20))?;
    w.put("a/one.txt", &sf("a/one.txt", 1, 10))?;
    w.put("b/two.txt", &sf("b/two.txt", 22, 21))?;
    assert_eq!(w.records(), 3);
    let closed = w.close()?;
    assert_eq!(closed, dir);
    assert!(dir.join(MANIFEST_FILE).exists(), "close must write MANIFEST");

    let r = ReadStore::open(&dir)?;
    assert_eq!(r.len(), 2);
    assert_eq!(r.get("a/one.txt"), Some(&sf("a/one.txt", 1, 10)));
    assert_eq!(
        r.get("b/two.txt"),
        Some(&sf("b/two.txt", 22, 21)),
        "later put must win"
    );
    assert!(r.get("missing").is_none(), "absent key is None, not an error");

    let keys: Vec<&str> = r.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a/one.txt", "b/two.txt"], "iteration is key-ordered");

    r.discard()?;
    assert!(!dir.exists(), "discard removes the directory");
    Ok(())
}

#[test]
fn empty_dir_opens_as_empty_store() -> Result<()> {
    let dir = unique_root("empty");
    let r = ReadStore::open(&dir)?;
    assert!(r.is_empty());
    assert!(dir.is_dir(), "open creates the directory");
    Ok(())
}

#[test]
fn rollover_spreads_records_over_segments() -> Result<()> {
    let dir = unique_root("rotate");
    let mut w = WriteStore::create_with_rotation(&dir, 256)?;
    for i in 0..200 {
        let key = format!("dir{}/file-{:04}.bin", i % 7, i);
        w.put(&key, &sf(&key, i, 1_700_000_000 + i))?;
    }
    w.close()?;

    let m = read_manifest(&dir)?.expect("manifest after close");
    assert!(m.segments.len() > 1, "expected several segments, got {:?}", m.segments);
    assert_eq!(m.records, 200);

    let r = ReadStore::open(&dir)?;
    assert_eq!(r.len(), 200);
    let f = r.get("dir3/file-0010.bin").expect("record present");
    assert_eq!(f.size, 10);
    Ok(())
}

#[test]
fn corrupt_segment_under_manifest_is_store_open_error() -> Result<()> {
    let dir = unique_root("corrupt");
    let mut w = WriteStore::create(&dir)?;
    for i in 0..10 {
        let key = format!("f{i}.txt");
        w.put(&key, &sf(&key, i, i))?;
    }
    w.close()?;

    // flip one byte inside the first record body
    let seg = dir.join("seg-000001.log");
    let mut f = OpenOptions::new().read(true).write(true).open(&seg)?;
    f.seek(SeekFrom::Start(20))?;
    f.write_all(&[0xFF])?;
    f.sync_all()?;
    drop(f);

    let err = match ReadStore::open(&dir) {
        Ok(_) => panic!("corrupt segment must not open"),
        Err(e) => e,
    };
    assert!(
        matches!(kind_of(&err), Some(ErrorKind::StoreOpen(_))),
        "unexpected error: {:#}",
        err
    );
    Ok(())
}

#[test]
fn partial_tail_without_manifest_is_dropped() -> Result<()> {
    let dir = unique_root("tail");
    {
        let mut w = WriteStore::create(&dir)?;
        for i in 0..5 {
            let key = format!("f{i}.txt");
            w.put(&key, &sf(&key, i, i))?;
        }
        // dropped without close: no MANIFEST, buffered data still reaches the file
    }
    assert!(!dir.join(MANIFEST_FILE).exists());

    let seg = dir.join("seg-000001.log");
    let len = fs::metadata(&seg)?.len();
    let f = OpenOptions::new().write(true).open(&seg)?;
    f.set_len(len - 3)?;
    drop(f);

    let r = ReadStore::open(&dir)?;
    assert_eq!(r.len(), 4, "last, truncated record must be ignored");
    assert!(r.get("f4.txt").is_none());
    assert!(r.get("f3.txt").is_some());
    Ok(())
}

#[test]
fn write_store_needs_an_empty_dir() -> Result<()> {
    let dir = unique_root("nonempty");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("stray.txt"), b"x")?;

    let err = match WriteStore::create(&dir) {
        Ok(_) => panic!("non-empty dir must be rejected"),
        Err(e) => e,
    };
    assert!(matches!(kind_of(&err), Some(ErrorKind::StoreOpen(_))));
    Ok(())
}

#[test]
fn second_writer_is_locked_out() -> Result<()> {
    let dir = unique_root("lock");
    let first = WriteStore::create(&dir)?;

    let err = match WriteStore::create(&dir) {
        Ok(_) => panic!("second writer must fail while the first holds the lock"),
        Err(e) => e,
    };
    assert!(matches!(kind_of(&err), Some(ErrorKind::StoreOpen(_))));

    first.close()?;
    Ok(())
}
