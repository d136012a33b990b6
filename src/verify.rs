//! verify: compare a source tree with a restored tree.
//!
//! Per directory level: list both sides, drop skipped names, sort by name, then require the same
//! names with the same kinds. Files must have equal sizes and mtimes within
//! MTIME_TOLERANCE_SECS (zip stores DOS time with 2-second granularity); directories are queued
//! on an explicit stack.
//!
//! Skips: ".DS_Store" always, plus the given globs matched against the entry name and its
//! '/'-separated path relative to the compared roots. Directory symlinks are ignored on both
//! sides, mirroring the scanner. A source directory absent from the restored tree only counts
//! as missing when it holds a non-skipped file.
//!
//! `verify` stops at the first difference; `verify_report` collects all of them.

use anyhow::Result;
use log::{debug, error, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ErrorKind;
use crate::pattern::PatternList;
use crate::util::system_time_secs;

pub const MTIME_TOLERANCE_SECS: i64 = 2;
pub const ALWAYS_SKIPPED: &str = ".DS_Store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// A compared root is not a directory.
    NotADirectory(PathBuf),
    /// In the source, not in the restored tree.
    Missing(String),
    /// In the restored tree, not in the source.
    Extra(String),
    KindMismatch(String),
    SizeMismatch { path: String, source: u64, restored: u64 },
    MtimeOutOfTolerance { path: String, source: i64, restored: i64 },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::NotADirectory(p) => write!(f, "not a directory: {}", p.display()),
            Mismatch::Missing(p) => write!(f, "missing: {}", p),
            Mismatch::Extra(p) => write!(f, "extra: {}", p),
            Mismatch::KindMismatch(p) => write!(f, "file/dir kind differs: {}", p),
            Mismatch::SizeMismatch {
                path,
                source,
                restored,
            } => write!(f, "size differs: {} ({} vs {})", path, source, restored),
            Mismatch::MtimeOutOfTolerance {
                path,
                source,
                restored,
            } => write!(f, "mtime differs: {} ({} vs {})", path, source, restored),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub files_compared: u64,
    pub dirs_compared: u64,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn is_match(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Ok when identical, otherwise a VerificationMismatch listing every difference.
    pub fn into_result(self) -> Result<()> {
        if self.is_match() {
            return Ok(());
        }
        let list: Vec<String> = self.mismatches.iter().map(|m| m.to_string()).collect();
        Err(ErrorKind::VerificationMismatch(format!(
            "{} difference(s): {}",
            list.len(),
            list.join("; ")
        ))
        .into())
    }
}

/// True when the trees match. Differences and I/O failures are logged and give false.
pub fn verify<S: AsRef<str>>(source: &Path, restored: &Path, skips: &[S]) -> bool {
    match compare(source, restored, skips, true) {
        Ok(report) => match report.mismatches.first() {
            None => true,
            Some(m) => {
                warn!("verify: {} vs {}: {}", source.display(), restored.display(), m);
                false
            }
        },
        Err(e) => {
            error!(
                "verify: {} vs {} failed: {:#}",
                source.display(),
                restored.display(),
                e
            );
            false
        }
    }
}

/// Full comparison. I/O failures are errors, differences are in the report.
pub fn verify_report<S: AsRef<str>>(
    source: &Path,
    restored: &Path,
    skips: &[S],
) -> Result<VerifyReport> {
    compare(source, restored, skips, false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File { size: u64, mtime: i64 },
    Dir,
    Other,
}

fn compare<S: AsRef<str>>(
    source: &Path,
    restored: &Path,
    skips: &[S],
    stop_at_first: bool,
) -> Result<VerifyReport> {
    let skips = PatternList::new(skips)?;
    let mut report = VerifyReport::default();

    for root in [source, restored] {
        if !root.is_dir() {
            report.mismatches.push(Mismatch::NotADirectory(root.to_path_buf()));
        }
    }
    if !report.is_match() {
        return Ok(report);
    }

    // relative dir paths, "" is the root
    let mut stack: Vec<String> = vec![String::new()];
    while let Some(rel_dir) = stack.pop() {
        report.dirs_compared += 1;
        let a = list(&join_rel(source, &rel_dir), &rel_dir, &skips)?;
        let b = list(&join_rel(restored, &rel_dir), &rel_dir, &skips)?;

        let mut found = Vec::new();
        for (name, ka) in &a {
            let rel = join_key(&rel_dir, name);
            match (ka, b.get(name)) {
                (Kind::Dir, None) => {
                    let dir = join_rel(source, &rel);
                    if holds_unskipped(&dir, &rel, &skips)? {
                        found.push(Mismatch::Missing(rel));
                    }
                }
                (_, None) => found.push(Mismatch::Missing(rel)),
                (Kind::Dir, Some(Kind::Dir)) => stack.push(rel),
                (
                    Kind::File { size: sa, mtime: ma },
                    Some(Kind::File { size: sb, mtime: mb }),
                ) => {
                    report.files_compared += 1;
                    if sa != sb {
                        found.push(Mismatch::SizeMismatch {
                            path: rel,
                            source: *sa,
                            restored: *sb,
                        });
                    } else if (ma - mb).abs() > MTIME_TOLERANCE_SECS {
                        found.push(Mismatch::MtimeOutOfTolerance {
                            path: rel,
                            source: *ma,
                            restored: *mb,
                        });
                    }
                }
                (Kind::Other, Some(Kind::Other)) => {}
                _ => found.push(Mismatch::KindMismatch(rel)),
            }
        }
        for name in b.keys().filter(|n| !a.contains_key(*n)) {
            found.push(Mismatch::Extra(join_key(&rel_dir, name)));
        }

        if !found.is_empty() {
            for m in &found {
                debug!("verify: {}", m);
            }
            report.mismatches.extend(found);
            if stop_at_first {
                report.mismatches.truncate(1);
                return Ok(report);
            }
        }
    }
    report.mismatches.sort_by_key(|m| m.to_string());
    Ok(report)
}

fn list(dir: &Path, rel_dir: &str, skips: &PatternList) -> Result<BTreeMap<String, Kind>> {
    let mut out = BTreeMap::new();
    for e in fs::read_dir(dir).map_err(|e| ErrorKind::filesystem(dir, e))? {
        let e = e.map_err(|e| ErrorKind::filesystem(dir, e))?;
        let name = e.file_name().to_string_lossy().into_owned();
        if name == ALWAYS_SKIPPED || skips.is_match_path_or_name(&join_key(rel_dir, &name)) {
            continue;
        }
        let path = e.path();
        let ft = e.file_type().map_err(|err| ErrorKind::filesystem(&path, err))?;
        let kind = if ft.is_symlink() {
            match fs::metadata(&path) {
                Ok(md) if md.is_dir() => continue,
                Ok(md) if md.is_file() => file_kind(&path, &md)?,
                _ => Kind::Other,
            }
        } else if ft.is_dir() {
            Kind::Dir
        } else if ft.is_file() {
            let md = e.metadata().map_err(|err| ErrorKind::filesystem(&path, err))?;
            file_kind(&path, &md)?
        } else {
            Kind::Other
        };
        out.insert(name, kind);
    }
    Ok(out)
}

/// True when the source subtree at `dir` holds a file that is not skipped. Directories holding
/// only skipped files are never restored.
fn holds_unskipped(dir: &Path, rel_dir: &str, skips: &PatternList) -> Result<bool> {
    let mut stack = vec![(dir.to_path_buf(), rel_dir.to_string())];
    while let Some((dir, rel_dir)) = stack.pop() {
        for (name, kind) in list(&dir, &rel_dir, skips)? {
            match kind {
                Kind::Dir => stack.push((dir.join(&name), join_key(&rel_dir, &name))),
                Kind::File { .. } => return Ok(true),
                Kind::Other => {}
            }
        }
    }
    Ok(false)
}

fn file_kind(path: &Path, md: &fs::Metadata) -> Result<Kind> {
    let mtime = md
        .modified()
        .map(system_time_secs)
        .map_err(|e| ErrorKind::filesystem(path, e))?;
    Ok(Kind::File {
        size: md.len(),
        mtime,
    })
}

fn join_key(rel_dir: &str, name: &str) -> String {
    if rel_dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", rel_dir, name)
    }
}

fn join_rel(root: &Path, rel_dir: &str) -> PathBuf {
    rel_dir.split('/').filter(|s| !s.is_empty()).fold(root.to_path_buf(), |p, s| p.join(s))
}
