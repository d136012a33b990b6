// tests/restore_verify.rs
//
// Run just this file:
//   cargo test --test restore_verify -- --nocapture
//
// Covers:
// 1) Scan -> archive (several chunks) -> extract all into a fresh dir -> verify is true.
// 2) verify_report lists every kind of difference; verify short-circuits to false.
// 3) Skips: .DS_Store always, globs by name and by relative path.
// 4) mtime tolerance.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;

use diffarchive::error::{kind_of, ErrorKind};
use diffarchive::restore::restore_from_archives;
use diffarchive::verify::MTIME_TOLERANCE_SECS;
use diffarchive::{
    verify, verify_report, ChunkedArchiver, CountingReporter, Mismatch, ReadStore, Scanner,
    WriteStore,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("datest-verify-{prefix}-{pid}-{t}-{id}"))
}

fn write_file(root: &Path, rel: &str, data: &[u8], mtime: u64) -> Result<PathBuf> {
    let p = root.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&p, data)?;
    set_mtime(&p, mtime)?;
    Ok(p)
}

fn set_mtime(p: &Path, mtime: u64) -> Result<()> {
    File::options()
        .write(true)
        .open(p)?
        .set_modified(UNIX_EPOCH + Duration::from_secs(mtime))?;
    Ok(())
}

/// Two identical little trees.
fn twin_trees(base: &Path) -> Result<(PathBuf, PathBuf)> {
    let a = base.join("a");
    let b = base.join("b");
    for root in [&a, &b] {
        write_file(root, "top.txt", b"top", 1_700_000_000)?;
        write_file(root, "sub/one.txt", b"one", 1_700_000_000)?;
        write_file(root, "sub/deeper/two.txt", b"two", 1_700_000_000)?;
    }
    Ok((a, b))
}

#[test]
fn archive_then_restore_verifies() -> Result<()> {
    let base = unique_root("roundtrip");
    let src = base.join("src");
    let mut rng = oorandom::Rand32::new(7);
    for i in 0..40u32 {
        let len = rng.rand_range(1..6000) as usize;
        let data: Vec<u8> = (0..len).map(|_| rng.rand_range(0..256) as u8).collect();
        let rel = format!("dir{}/file{:02}.bin", i % 5, i);
        write_file(&src, &rel, &data, 1_700_000_000 + u64::from(i))?;
    }

    let rep = CountingReporter::new();
    let reference = ReadStore::open(&base.join("ref"))?;
    let mut out = WriteStore::create(&base.join("store"))?;
    let scan = Scanner::new(&src, &[] as &[&str], &rep)?.scan(&reference, &mut out)?;
    out.close()?;

    let chunks = ChunkedArchiver::new(&base.join("chunks"), "rt", 16 * 1024, "pw", &rep)
        .archive(&scan.updated)?;
    assert!(chunks.len() > 1, "small cap should give several chunks");

    let restored = base.join("restored");
    let summary = restore_from_archives(&chunks, &restored, "pw")?;
    assert_eq!(summary.archives, chunks.len());
    assert_eq!(summary.files, 40);

    assert!(verify(&src, &restored, &[] as &[&str]));
    let report = verify_report(&src, &restored, &[] as &[&str])?;
    assert!(report.is_match(), "{:?}", report.mismatches);
    assert_eq!(report.files_compared, 40);
    Ok(())
}

#[test]
fn report_lists_every_difference() -> Result<()> {
    let base = unique_root("diffs");
    let (a, b) = twin_trees(&base)?;

    fs::remove_file(b.join("top.txt"))?; // missing
    write_file(&b, "sub/extra.txt", b"x", 1_700_000_000)?; // extra
    write_file(&b, "sub/one.txt", b"one!", 1_700_000_000)?; // size
    set_mtime(&b.join("sub/deeper/two.txt"), 1_700_000_100)?; // mtime
    write_file(&a, "kind", b"file here", 1_700_000_000)?;
    fs::create_dir_all(b.join("kind"))?; // kind

    assert!(!verify(&a, &b, &[] as &[&str]));

    let report = verify_report(&a, &b, &[] as &[&str])?;
    let m = &report.mismatches;
    assert_eq!(m.len(), 5, "{:?}", m);
    assert!(m.contains(&Mismatch::Missing("top.txt".into())));
    assert!(m.contains(&Mismatch::Extra("sub/extra.txt".into())));
    assert!(m.contains(&Mismatch::KindMismatch("kind".into())));
    assert!(m.contains(&Mismatch::SizeMismatch {
        path: "sub/one.txt".into(),
        source: 3,
        restored: 4
    }));
    assert!(m.contains(&Mismatch::MtimeOutOfTolerance {
        path: "sub/deeper/two.txt".into(),
        source: 1_700_000_000,
        restored: 1_700_000_100
    }));

    let err = report.into_result().unwrap_err();
    assert!(matches!(
        kind_of(&err),
        Some(ErrorKind::VerificationMismatch(_))
    ));
    Ok(())
}

#[test]
fn mtime_within_tolerance_is_equal() -> Result<()> {
    let base = unique_root("tolerance");
    let (a, b) = twin_trees(&base)?;

    set_mtime(&b.join("top.txt"), 1_700_000_000 + MTIME_TOLERANCE_SECS as u64)?;
    assert!(verify(&a, &b, &[] as &[&str]));

    set_mtime(&b.join("top.txt"), 1_700_000_000 + MTIME_TOLERANCE_SECS as u64 + 1)?;
    assert!(!verify(&a, &b, &[] as &[&str]));
    Ok(())
}

#[test]
fn skips_by_name_path_and_ds_store() -> Result<()> {
    let base = unique_root("skips");
    let (a, b) = twin_trees(&base)?;

    write_file(&a, ".DS_Store", b"finder", 1_700_000_000)?;
    write_file(&b, "sub/.DS_Store", b"finder", 1_700_000_000)?;
    write_file(&a, "notes.tmp", b"scratch", 1_700_000_000)?;
    write_file(&a, "sub/cache/x.bin", b"cached", 1_700_000_000)?;

    assert!(!verify(&a, &b, &[] as &[&str]), "without skips the extra files differ");
    assert!(verify(&a, &b, &["*.tmp", "sub/cache"]));
    Ok(())
}

#[test]
fn absent_dir_is_missing_only_with_unskipped_files() -> Result<()> {
    let base = unique_root("absentdir");
    let (a, b) = twin_trees(&base)?;

    write_file(&a, "cache/x.bin", b"cached", 1_700_000_000)?;
    write_file(&a, "cache/deep/y.bin", b"cached", 1_700_000_000)?;
    fs::create_dir_all(a.join("hollow/inner"))?;
    assert!(verify(&a, &b, &["cache/**"]));

    write_file(&a, "cache/deep/keep.txt", b"kept", 1_700_000_000)?;
    let report = verify_report(&a, &b, &["cache/**/*.bin"])?;
    assert_eq!(report.mismatches, vec![Mismatch::Missing("cache".into())]);
    Ok(())
}

#[test]
fn non_directory_roots_do_not_verify() -> Result<()> {
    let base = unique_root("roots");
    let (a, _) = twin_trees(&base)?;

    assert!(!verify(&a, &base.join("missing"), &[] as &[&str]));
    assert!(!verify(&a.join("top.txt"), &a, &[] as &[&str]));

    let report = verify_report(&a, &base.join("missing"), &[] as &[&str])?;
    assert_eq!(
        report.mismatches,
        vec![Mismatch::NotADirectory(base.join("missing"))]
    );
    Ok(())
}
