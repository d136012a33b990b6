//! scan: walk a task root and classify files against the reference store.
//!
//! For every file:
//! 1. relative path ('/'-separated) under the root;
//! 2. first matching exclude pattern -> `skipped`, no store access at all;
//! 3. changed when the reference store has no record, or size / mtime (unix seconds) / name
//!    differ;
//! 4. the fresh SFile goes into the write store unconditionally;
//! 5. `updated` or `unchanged`.
//!
//! The walk uses an explicit stack of directories, so tree depth does not grow the call stack.
//! Sibling order is whatever the filesystem returns. Any stat/read_dir failure aborts the scan:
//! a partial manifest would make the next run treat the missing files as new or lose them.
//!
//! Symlinks: a link to a file is scanned as that file, a link to a directory is not descended.
//! Sockets, fifos and devices are ignored.
//!
//! Record keys are UTF-8. A file or directory whose name is not valid UTF-8 aborts the scan with
//! a Filesystem error naming the entry.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ErrorKind;
use crate::pattern::PatternList;
use crate::report::Reporter;
use crate::sfile::{SFile, ScannedFile};
use crate::store::{ReadStore, WriteStore};
use crate::util::relative_key;

#[derive(Debug, Default)]
pub struct ScanResult {
    pub updated: Vec<ScannedFile>,
    pub unchanged: Vec<SFile>,
    pub skipped: Vec<String>,
}

impl ScanResult {
    /// Files visited (updated + unchanged + skipped).
    pub fn total(&self) -> usize {
        self.updated.len() + self.unchanged.len() + self.skipped.len()
    }

    /// Sum of sizes of the updated files.
    pub fn updated_bytes(&self) -> u64 {
        self.updated.iter().map(|f| f.file.size_bytes()).sum()
    }
}

pub struct Scanner<'r> {
    root: PathBuf,
    excludes: PatternList,
    reporter: &'r dyn Reporter,
}

impl<'r> Scanner<'r> {
    pub fn new<S: AsRef<str>>(
        root: &Path,
        excludes: &[S],
        reporter: &'r dyn Reporter,
    ) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            excludes: PatternList::new(excludes)?,
            reporter,
        })
    }

    pub fn scan(&self, reference: &ReadStore, out: &mut WriteStore) -> Result<ScanResult> {
        info!(
            "scan: start root={} excludes={} reference_records={}",
            self.root.display(),
            self.excludes.len(),
            reference.len()
        );
        let mut res = ScanResult::default();
        let mut stack: Vec<PathBuf> = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let rd = fs::read_dir(&dir).map_err(|e| ErrorKind::filesystem(&dir, e))?;
            for entry in rd {
                let entry = entry.map_err(|e| ErrorKind::filesystem(&dir, e))?;
                let path = entry.path();
                let ft = entry
                    .file_type()
                    .map_err(|e| ErrorKind::filesystem(&path, e))?;

                if ft.is_dir() {
                    stack.push(path);
                    continue;
                }

                // follow symlinks for the real stat
                let md = fs::metadata(&path).map_err(|e| ErrorKind::filesystem(&path, e))?;
                if md.is_dir() {
                    debug!("scan: not following directory symlink {}", path.display());
                    continue;
                }
                if !md.is_file() {
                    warn!("scan: ignoring special file {}", path.display());
                    continue;
                }

                self.visit_file(&path, &md, reference, out, &mut res)?;
                self.reporter.on_scan_progress(
                    res.total() as u64,
                    res.updated.len() as u64,
                    res.skipped.len() as u64,
                );
            }
        }

        info!(
            "scan: done root={} scanned={} changed={} unchanged={} skipped={}",
            self.root.display(),
            res.total(),
            res.updated.len(),
            res.unchanged.len(),
            res.skipped.len()
        );
        Ok(res)
    }

    fn visit_file(
        &self,
        path: &Path,
        md: &fs::Metadata,
        reference: &ReadStore,
        out: &mut WriteStore,
        res: &mut ScanResult,
    ) -> Result<()> {
        let rel = relative_key(&self.root, path)
            .map_err(|e| ErrorKind::filesystem(path, e))?;

        if let Some(pattern) = self.excludes.first_match(&rel) {
            debug!("scan: skipped {} (exclude {})", rel, pattern);
            res.skipped.push(rel);
            return Ok(());
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let current =
            SFile::from_metadata(&rel, &name, md).map_err(|e| ErrorKind::filesystem(path, e))?;

        let changed = match reference.get(&rel) {
            None => true,
            Some(prev) => current.differs_from(prev),
        };
        debug!(
            "scan: {} updated={} size={}",
            rel, changed, current.size
        );

        out.put(&rel, &current)
            .with_context(|| format!("record {} in write store", rel))?;

        if changed {
            res.updated.push(ScannedFile {
                source: path.to_path_buf(),
                file: current,
            });
        } else {
            res.unchanged.push(current);
        }
        Ok(())
    }
}

/// One-shot helper: build a Scanner and run it.
pub fn scan<S: AsRef<str>>(
    root: &Path,
    excludes: &[S],
    reference: &ReadStore,
    out: &mut WriteStore,
    reporter: &dyn Reporter,
) -> Result<ScanResult> {
    Scanner::new(root, excludes, reporter)?.scan(reference, out)
}
