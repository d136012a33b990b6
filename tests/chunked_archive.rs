// tests/chunked_archive.rs
//
// Run just this file:
//   cargo test --test chunked_archive -- --nocapture
//
// Covers:
// 1) Empty input: no chunk files at all.
// 2) Three 4 MiB files, cap 10 MiB: two chunks (2 + 1 entries).
// 3) One 50 MiB file, cap 10 MiB: a single chunk, no splitting.
// 4) Random sizes: cap respected unless a chunk holds one oversized file, no empty chunks,
//    every file exactly once.
// 5) Password-protected chunks: right password extracts, wrong or missing one is ArchiveFormat.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;

use diffarchive::error::is_archive_format;
use diffarchive::{extract, ChunkedArchiver, CountingReporter, SFile, ScannedFile};

const MIB: u64 = 1024 * 1024;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("datest-chunk-{prefix}-{pid}-{t}-{id}"))
}

/// Sparse file of `size` bytes (zeros) with a fixed mtime.
fn sparse_file(root: &Path, rel: &str, size: u64, mtime: u64) -> Result<ScannedFile> {
    let p = root.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent)?;
    }
    let f = File::create(&p)?;
    f.set_len(size)?;
    f.set_modified(UNIX_EPOCH + Duration::from_secs(mtime))?;
    Ok(ScannedFile {
        source: p,
        file: SFile {
            path: rel.to_string(),
            name: rel.rsplit('/').next().unwrap_or(rel).to_string(),
            size: size as i64,
            mtime: mtime as i64,
        },
    })
}

/// entry name -> uncompressed size
fn entries_of(chunk: &Path, password: &str) -> Result<BTreeMap<String, u64>> {
    let mut zip = zip::ZipArchive::new(File::open(chunk)?)?;
    let mut out = BTreeMap::new();
    for i in 0..zip.len() {
        let e = if password.is_empty() {
            zip.by_index(i)?
        } else {
            zip.by_index_decrypt(i, password.as_bytes())?
        };
        out.insert(e.name().to_string(), e.size());
    }
    Ok(out)
}

#[test]
fn empty_input_produces_no_chunks() -> Result<()> {
    let base = unique_root("empty");
    let out = base.join("chunks");
    let rep = CountingReporter::new();

    let chunks = ChunkedArchiver::new(&out, "t1", 10 * MIB, "", &rep).archive(&[])?;
    assert!(chunks.is_empty());
    let leftovers = if out.exists() { fs::read_dir(&out)?.count() } else { 0 };
    assert_eq!(leftovers, 0, "no file may be left behind");
    assert_eq!(rep.stats().chunks, 0);
    Ok(())
}

#[test]
fn three_4mib_files_cap_10mib_two_chunks() -> Result<()> {
    let base = unique_root("s2");
    let src = base.join("src");
    let files = vec![
        sparse_file(&src, "one.bin", 4 * MIB, 1_700_000_000)?,
        sparse_file(&src, "two.bin", 4 * MIB, 1_700_000_000)?,
        sparse_file(&src, "three.bin", 4 * MIB, 1_700_000_000)?,
    ];
    let rep = CountingReporter::new();
    let archiver = ChunkedArchiver::new(&base.join("chunks"), "my task", 10 * MIB, "", &rep);
    let chunks = archiver.archive(&files)?;

    assert_eq!(chunks.len(), 2);
    let first = entries_of(&chunks[0], "")?;
    let second = entries_of(&chunks[1], "")?;
    assert_eq!(first.keys().collect::<Vec<_>>(), vec!["one.bin", "two.bin"]);
    assert_eq!(second.keys().collect::<Vec<_>>(), vec!["three.bin"]);

    let n0 = chunks[0].file_name().and_then(|s| s.to_str()).unwrap_or_default();
    let n1 = chunks[1].file_name().and_then(|s| s.to_str()).unwrap_or_default();
    assert!(n0.starts_with("my_task_") && n0.ends_with(".zip"), "name: {n0}");
    assert!(n1.ends_with("_1.zip"), "second chunk carries index 1: {n1}");
    assert_eq!(n0, archiver.chunk_file_name(0));

    let stats = rep.stats();
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.archived_files, 3);
    assert_eq!(stats.archived_bytes, 12 * MIB);
    Ok(())
}

#[test]
fn oversized_file_gets_its_own_chunk() -> Result<()> {
    let base = unique_root("s3");
    let src = base.join("src");
    let files = vec![sparse_file(&src, "big.bin", 50 * MIB, 1_700_000_000)?];
    let rep = CountingReporter::new();

    let chunks = ChunkedArchiver::new(&base.join("chunks"), "t", 10 * MIB, "", &rep)
        .archive(&files)?;
    assert_eq!(chunks.len(), 1);
    let entries = entries_of(&chunks[0], "")?;
    assert_eq!(entries.get("big.bin"), Some(&(50 * MIB)), "file is not split");
    Ok(())
}

#[test]
fn random_sizes_respect_cap_and_cover_every_file() -> Result<()> {
    let base = unique_root("random");
    let src = base.join("src");
    let cap = 64 * 1024;
    let mut rng = oorandom::Rand32::new(0xc0ff_ee01);

    let mut files = Vec::new();
    for i in 0..60u32 {
        // mostly small, sometimes above the cap
        let size = if rng.rand_range(0..10) == 0 {
            cap as u32 + rng.rand_range(1..8192)
        } else {
            rng.rand_range(0..20_000)
        };
        let rel = format!("d{}/f{:03}.bin", i % 4, i);
        files.push(sparse_file(&src, &rel, size as u64, 1_700_000_000)?);
    }

    let rep = CountingReporter::new();
    let chunks = ChunkedArchiver::new(&base.join("chunks"), "t", cap, "", &rep).archive(&files)?;

    let mut seen = BTreeMap::new();
    for c in &chunks {
        let entries = entries_of(c, "")?;
        assert!(!entries.is_empty(), "empty chunk {}", c.display());
        let sum: u64 = entries.values().sum();
        assert!(
            sum <= cap || entries.len() == 1,
            "chunk {} holds {} bytes in {} entries",
            c.display(),
            sum,
            entries.len()
        );
        for (k, v) in entries {
            assert!(seen.insert(k, v).is_none(), "file archived twice");
        }
    }
    let expected: BTreeMap<String, u64> = files
        .iter()
        .map(|f| (f.file.path.clone(), f.file.size as u64))
        .collect();
    assert_eq!(seen, expected);
    Ok(())
}

#[test]
fn password_protected_chunk() -> Result<()> {
    let base = unique_root("pw");
    let src = base.join("src");
    fs::create_dir_all(&src)?;
    let p = src.join("secret.txt");
    fs::write(&p, b"top secret payload")?;
    File::options()
        .write(true)
        .open(&p)?
        .set_modified(UNIX_EPOCH + Duration::from_secs(1_700_000_001))?;
    let files = vec![ScannedFile {
        source: p,
        file: SFile {
            path: "nested/secret.txt".into(),
            name: "secret.txt".into(),
            size: 18,
            mtime: 1_700_000_001,
        },
    }];

    let rep = CountingReporter::new();
    let chunks =
        ChunkedArchiver::new(&base.join("chunks"), "t", MIB, "right-pw", &rep).archive(&files)?;
    assert_eq!(chunks.len(), 1);

    let ok_dir = base.join("ok");
    assert_eq!(extract(&chunks[0], &ok_dir, "right-pw")?, 1);
    let restored = ok_dir.join("nested").join("secret.txt");
    assert_eq!(fs::read(&restored)?, b"top secret payload");
    let mtime = fs::metadata(&restored)?
        .modified()?
        .duration_since(UNIX_EPOCH)?
        .as_secs() as i64;
    assert!(
        (mtime - 1_700_000_001).abs() <= 2,
        "entry mtime restored within DOS granularity, got {mtime}"
    );

    let err = extract(&chunks[0], &base.join("wrong"), "wrong-pw").unwrap_err();
    assert!(is_archive_format(&err), "wrong password: {:#}", err);

    let err = extract(&chunks[0], &base.join("none"), "").unwrap_err();
    assert!(is_archive_format(&err), "missing password: {:#}", err);
    Ok(())
}

#[test]
fn garbage_file_is_archive_format_error() -> Result<()> {
    let base = unique_root("garbage");
    fs::create_dir_all(&base)?;
    let bogus = base.join("bogus.zip");
    fs::write(&bogus, b"definitely not a zip container")?;

    let err = extract(&bogus, &base.join("out"), "").unwrap_err();
    assert!(is_archive_format(&err));
    Ok(())
}
