//! restore: rebuild a task's tree from the archives listed in its registry.
//!
//! Archives are applied in ledger order into one output directory, so a later archive overwrites
//! what an earlier one wrote for the same path (newest version wins). Files that were deleted
//! from the source after being archived come back; deletions are not tracked.

use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::extract;
use crate::blob::{archive_key, BlobStore, Fetch};
use crate::error::ErrorKind;
use crate::registry;

pub const STAGING_DIR: &str = "restore-staging";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub archives: usize,
    pub files: usize,
}

/// Download and extract every archive of `task_id` into `out_dir`. Downloads are staged under
/// `<work_dir>/restore-staging` and removed once extracted.
pub fn restore<B: BlobStore + ?Sized>(
    blob: &B,
    task_id: &str,
    out_dir: &Path,
    work_dir: &Path,
    password: &str,
) -> Result<RestoreSummary> {
    let names = registry::read(blob, task_id, work_dir)?;
    if names.is_empty() {
        warn!("restore: task {} has no archives in its registry", task_id);
        return Ok(RestoreSummary::default());
    }
    fs::create_dir_all(out_dir).map_err(|e| ErrorKind::filesystem(out_dir, e))?;
    let staging = work_dir.join(STAGING_DIR);
    fs::create_dir_all(&staging).map_err(|e| ErrorKind::filesystem(&staging, e))?;

    let mut summary = RestoreSummary::default();
    for (i, name) in names.iter().enumerate() {
        let key = archive_key(task_id, name);
        let local = staging.join(name);
        if blob.get(&key, &local)? == Fetch::NotFound {
            return Err(ErrorKind::ArchiveFormat(format!(
                "{} is listed in the registry but missing from storage",
                key
            ))
            .into());
        }
        let n = extract(&local, out_dir, password)
            .with_context(|| format!("restore task {}: extract {}", task_id, name))?;
        fs::remove_file(&local).map_err(|e| ErrorKind::filesystem(&local, e))?;
        info!(
            "restore: task {} archive {}/{} {} files={}",
            task_id,
            i + 1,
            names.len(),
            name,
            n
        );
        summary.archives += 1;
        summary.files += n;
    }
    // only succeeds when empty
    let _ = fs::remove_dir(&staging);

    info!(
        "restore: task {} done archives={} files={} into {}",
        task_id,
        summary.archives,
        summary.files,
        out_dir.display()
    );
    Ok(summary)
}

/// Extract local chunk files, in order, into `out_dir`.
pub fn restore_from_archives(
    archives: &[PathBuf],
    out_dir: &Path,
    password: &str,
) -> Result<RestoreSummary> {
    let mut summary = RestoreSummary::default();
    for a in archives {
        summary.files += extract(a, out_dir, password)
            .with_context(|| format!("extract {}", a.display()))?;
        summary.archives += 1;
    }
    Ok(summary)
}
