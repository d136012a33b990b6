//! task: per-task pipelines and the multi-task loops.
//!
//! Backup of one task, inside <working_dir>/<task>/:
//!   1. reference/  <- previous snapshot (or empty on first run)
//!   2. current/    <- fresh WriteStore filled by the scan
//!   3. chunks/     <- zip chunks of the updated files
//!   4. db.zip      <- current/ packed
//!   5. upload chunks (task tier), db.zip (standard tier), append chunk names to the registry
//!   6. remove local temporaries
//!
//! A failing step aborts the task and leaves its working dir as is. The loops isolate tasks: a
//! failure is logged and recorded in the task's outcome, the next task still runs.

use anyhow::{Context, Result};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::ChunkedArchiver;
use crate::blob::{archive_key, snapshot_key, BlobStore};
use crate::config::{BackupPlan, StorageTier, TaskContext};
use crate::error::ErrorKind;
use crate::registry;
use crate::report::{Reporter, RunStats};
use crate::restore::{restore, RestoreSummary};
use crate::scan::Scanner;
use crate::sfile::SFile;
use crate::snapshot::{fetch_reference, pack};
use crate::store::WriteStore;
use crate::util::file_name_of;
use crate::verify::{verify_report, VerifyReport};

pub const CURRENT_DIR: &str = "current";
pub const CHUNKS_DIR: &str = "chunks";
pub const SNAPSHOT_FILE: &str = "db.zip";
pub const VIEW_DIR: &str = "view";

#[derive(Debug, Clone, Default)]
pub struct BackupSummary {
    pub task_id: String,
    pub stats: RunStats,
    /// Archive file names uploaded by this run, in chunk order.
    pub archives: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub task_id: String,
    pub restore: RestoreSummary,
    pub verify: Option<VerifyReport>,
}

/// Result of one task inside a multi-task loop.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub task_id: String,
    pub result: Result<T>,
}

impl<T> TaskOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Full backup pipeline for one task.
pub fn backup_task<B: BlobStore + ?Sized>(
    ctx: &TaskContext<'_>,
    blob: &B,
    reporter: &dyn Reporter,
) -> Result<BackupSummary> {
    ctx.task.validate()?;
    ctx.check_root()?;
    let id = ctx.id();
    let work = ctx.task_work_dir();
    fs::create_dir_all(&work).map_err(|e| ErrorKind::filesystem(&work, e))?;
    info!(
        "task {}: backup start root={} work={} cap={} tier={}",
        id,
        ctx.root().display(),
        work.display(),
        ctx.max_chunk_bytes(),
        ctx.storage_tier()
    );

    let reference = fetch_reference(blob, id, &work, ctx.password())?;

    let current_dir = work.join(CURRENT_DIR);
    remove_leftover(&current_dir)?;
    let mut current = WriteStore::create(&current_dir)?;

    let scan = Scanner::new(ctx.root(), ctx.excludes(), reporter)?
        .scan(&reference, &mut current)
        .with_context(|| format!("task {}: scan {}", id, ctx.root().display()))?;
    reference.discard()?;

    let chunks_dir = work.join(CHUNKS_DIR);
    remove_leftover(&chunks_dir)?;
    let archiver = ChunkedArchiver::new(
        &chunks_dir,
        id,
        ctx.max_chunk_bytes(),
        ctx.password(),
        reporter,
    );
    let chunks = archiver
        .archive(&scan.updated)
        .with_context(|| format!("task {}: archive", id))?;

    let store_dir = current.close()?;
    let snapshot = pack(&store_dir, &work.join(SNAPSHOT_FILE), ctx.password())?;

    let mut names = Vec::with_capacity(chunks.len());
    for c in &chunks {
        let name = file_name_of(c);
        blob.put(&archive_key(id, &name), c, ctx.storage_tier())
            .with_context(|| format!("task {}: upload {}", id, name))?;
        names.push(name);
    }
    blob.put(&snapshot_key(id), &snapshot, &StorageTier::standard())
        .with_context(|| format!("task {}: upload snapshot", id))?;
    registry::append(blob, id, &names, &work)?;

    for c in &chunks {
        fs::remove_file(c).map_err(|e| ErrorKind::filesystem(c, e))?;
    }
    if chunks_dir.exists() {
        fs::remove_dir_all(&chunks_dir).map_err(|e| ErrorKind::filesystem(&chunks_dir, e))?;
    }
    fs::remove_file(&snapshot).map_err(|e| ErrorKind::filesystem(&snapshot, e))?;

    let stats = RunStats {
        scanned: scan.total() as u64,
        changed: scan.updated.len() as u64,
        skipped: scan.skipped.len() as u64,
        archived_files: scan.updated.len() as u64,
        archived_bytes: scan.updated_bytes(),
        chunks: names.len() as u64,
    };
    reporter.on_task_summary(id, &stats);
    Ok(BackupSummary {
        task_id: id.to_string(),
        stats,
        archives: names,
    })
}

/// Run every task of the plan in order. Config errors stop everything up front; task failures
/// are isolated.
pub fn run_backups<B: BlobStore + ?Sized>(
    plan: &BackupPlan,
    blob: &B,
    reporter: &dyn Reporter,
) -> Result<Vec<TaskOutcome<BackupSummary>>> {
    plan.validate()?;
    let mut out = Vec::with_capacity(plan.tasks.len());
    for ctx in plan.contexts() {
        let result = backup_task(&ctx, blob, reporter);
        if let Err(e) = &result {
            error!("task {}: backup failed: {:#}", ctx.id(), e);
        }
        out.push(TaskOutcome {
            task_id: ctx.id().to_string(),
            result,
        });
    }
    let failed = out.iter().filter(|o| !o.is_ok()).count();
    info!("backup: {} task(s), {} failed", out.len(), failed);
    Ok(out)
}

/// Restore one task into `out_dir`, optionally comparing the result with the live source.
pub fn restore_task<B: BlobStore + ?Sized>(
    ctx: &TaskContext<'_>,
    blob: &B,
    out_dir: &Path,
    verify: bool,
) -> Result<RestoreReport> {
    let work = ctx.task_work_dir();
    fs::create_dir_all(&work).map_err(|e| ErrorKind::filesystem(&work, e))?;
    let summary = restore(blob, ctx.id(), out_dir, &work, ctx.password())?;

    let report = if verify {
        let r = verify_report(ctx.root(), out_dir, ctx.excludes())
            .with_context(|| format!("task {}: verify", ctx.id()))?;
        if r.is_match() {
            info!(
                "task {}: verify ok files={} dirs={}",
                ctx.id(),
                r.files_compared,
                r.dirs_compared
            );
        } else {
            for m in &r.mismatches {
                error!("task {}: verify: {}", ctx.id(), m);
            }
        }
        Some(r)
    } else {
        None
    };
    Ok(RestoreReport {
        task_id: ctx.id().to_string(),
        restore: summary,
        verify: report,
    })
}

/// Restore then verify; a mismatch is a VerificationMismatch error.
pub fn restore_and_verify<B: BlobStore + ?Sized>(
    ctx: &TaskContext<'_>,
    blob: &B,
    out_dir: &Path,
) -> Result<RestoreSummary> {
    let r = restore_task(ctx, blob, out_dir, true)?;
    if let Some(v) = r.verify {
        v.into_result()
            .with_context(|| format!("task {}: restored tree differs", ctx.id()))?;
    }
    Ok(r.restore)
}

/// Restore every task into `<out_root>/<task>`, isolated like run_backups.
pub fn run_restores<B: BlobStore + ?Sized>(
    plan: &BackupPlan,
    blob: &B,
    out_root: &Path,
    verify: bool,
) -> Result<Vec<TaskOutcome<RestoreReport>>> {
    plan.validate()?;
    let mut out = Vec::with_capacity(plan.tasks.len());
    for ctx in plan.contexts() {
        let dest = restore_dir(out_root, ctx.id());
        let result = restore_task(&ctx, blob, &dest, verify);
        if let Err(e) = &result {
            error!("task {}: restore failed: {:#}", ctx.id(), e);
        }
        out.push(TaskOutcome {
            task_id: ctx.id().to_string(),
            result,
        });
    }
    Ok(out)
}

pub fn restore_dir(out_root: &Path, task_id: &str) -> PathBuf {
    out_root.join(crate::blob::task_prefix(task_id))
}

/// Records of the task's latest snapshot, in path order.
pub fn view<B: BlobStore + ?Sized>(ctx: &TaskContext<'_>, blob: &B) -> Result<Vec<SFile>> {
    let work = ctx.task_work_dir().join(VIEW_DIR);
    fs::create_dir_all(&work).map_err(|e| ErrorKind::filesystem(&work, e))?;
    let store = fetch_reference(blob, ctx.id(), &work, ctx.password())?;
    let files: Vec<SFile> = store.iter().map(|(_, f)| f.clone()).collect();
    store.discard()?;
    fs::remove_dir_all(&work).map_err(|e| ErrorKind::filesystem(&work, e))?;
    Ok(files)
}

fn remove_leftover(dir: &Path) -> Result<()> {
    if dir.exists() {
        info!("task: removing leftover {}", dir.display());
        fs::remove_dir_all(dir).map_err(|e| ErrorKind::filesystem(dir, e))?;
    }
    Ok(())
}
