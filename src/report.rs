//! report: progress and summary reporting, injected into each component.
//!
//! Components never print; they call a `Reporter`. `LogReporter` forwards to the `log` facade,
//! `CountingReporter` keeps counters (tests, final summaries).

use log::{debug, info};
use std::cell::RefCell;

/// Per-task counters. Also the final per-task summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub scanned: u64,
    pub changed: u64,
    pub skipped: u64,
    pub archived_files: u64,
    pub archived_bytes: u64,
    pub chunks: u64,
}

pub trait Reporter {
    /// After each file visited by the scanner.
    fn on_scan_progress(&self, scanned: u64, changed: u64, skipped: u64);

    /// After each file written into a chunk.
    fn on_archive_progress(&self, done: u64, total: u64, bytes: u64);

    /// A non-empty chunk was finished.
    fn on_chunk_flushed(&self, index: u32, entries: u64, bytes: u64, path: &std::path::Path);

    /// Final summary of one task.
    fn on_task_summary(&self, task_id: &str, stats: &RunStats);
}

/// Progress at debug level (one line per file would flood info), summaries at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn on_scan_progress(&self, scanned: u64, changed: u64, skipped: u64) {
        debug!(
            "scan: scanned={} changed={} skipped={}",
            scanned, changed, skipped
        );
    }

    fn on_archive_progress(&self, done: u64, total: u64, bytes: u64) {
        debug!("archive: zipped {}/{} file(s), bytes={}", done, total, bytes);
    }

    fn on_chunk_flushed(&self, index: u32, entries: u64, bytes: u64, path: &std::path::Path) {
        info!(
            "archive: chunk #{} done entries={} bytes={} path={}",
            index,
            entries,
            bytes,
            path.display()
        );
    }

    fn on_task_summary(&self, task_id: &str, stats: &RunStats) {
        info!(
            "task {}: scanned={} changed={} skipped={} archived={} bytes={} chunks={}",
            task_id,
            stats.scanned,
            stats.changed,
            stats.skipped,
            stats.archived_files,
            stats.archived_bytes,
            stats.chunks
        );
    }
}

/// Keeps the latest counters. Not Sync.
#[derive(Debug, Default)]
pub struct CountingReporter {
    stats: RefCell<RunStats>,
    summaries: RefCell<Vec<(String, RunStats)>>,
}

impl CountingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RunStats {
        self.stats.borrow().clone()
    }

    pub fn summaries(&self) -> Vec<(String, RunStats)> {
        self.summaries.borrow().clone()
    }
}

impl Reporter for CountingReporter {
    fn on_scan_progress(&self, scanned: u64, changed: u64, skipped: u64) {
        let mut s = self.stats.borrow_mut();
        s.scanned = scanned;
        s.changed = changed;
        s.skipped = skipped;
    }

    fn on_archive_progress(&self, done: u64, _total: u64, bytes: u64) {
        let mut s = self.stats.borrow_mut();
        s.archived_files = done;
        s.archived_bytes = bytes;
    }

    fn on_chunk_flushed(&self, _index: u32, _entries: u64, _bytes: u64, _path: &std::path::Path) {
        self.stats.borrow_mut().chunks += 1;
    }

    fn on_task_summary(&self, task_id: &str, stats: &RunStats) {
        self.summaries
            .borrow_mut()
            .push((task_id.to_string(), stats.clone()));
    }
}
