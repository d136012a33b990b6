//! snapshot: a closed store directory <-> one zip blob (`<task>/db.zip`).
//!
//! The blob is a single unbounded chunk holding the store files flat (segments + MANIFEST,
//! never LOCK). On the way back it is extracted and opened as a ReadStore. A task that has no
//! blob yet starts from an empty reference store (every file counts as new).

use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{extract, Chunk};
use crate::blob::{snapshot_key, BlobStore, Fetch};
use crate::error::ErrorKind;
use crate::lock::LOCK_FILE;
use crate::store::ReadStore;
use crate::util::{file_name_of, system_time_secs};

/// Working-dir layout of the reference side.
pub const REFERENCE_DIR: &str = "reference";
pub const REFERENCE_DOWNLOAD: &str = "reference-db.zip";

/// Package the closed store at `store_dir` into `out_path`, then delete `store_dir`.
pub fn pack(store_dir: &Path, out_path: &Path, password: &str) -> Result<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for e in fs::read_dir(store_dir).map_err(|e| ErrorKind::filesystem(store_dir, e))? {
        let e = e.map_err(|e| ErrorKind::filesystem(store_dir, e))?;
        let ft = e.file_type().map_err(|err| ErrorKind::filesystem(&e.path(), err))?;
        if !ft.is_file() || e.file_name() == LOCK_FILE {
            continue;
        }
        files.push(e.path());
    }
    files.sort();

    let mut chunk = Chunk::open(out_path, 0)?;
    for path in &files {
        let md = fs::metadata(path).map_err(|e| ErrorKind::filesystem(path, e))?;
        let mtime = md
            .modified()
            .map(system_time_secs)
            .map_err(|e| ErrorKind::filesystem(path, e))?;
        chunk.write_file(path, &file_name_of(path), mtime, md.len(), password)?;
    }
    let packed = chunk.flush()?.ok_or_else(|| {
        ErrorKind::Filesystem(format!("store dir {} has nothing to pack", store_dir.display()))
    })?;

    fs::remove_dir_all(store_dir)
        .with_context(|| format!("remove packed store {}", store_dir.display()))?;
    info!(
        "snapshot: packed {} file(s) from {} into {}",
        files.len(),
        store_dir.display(),
        packed.display()
    );
    Ok(packed)
}

/// Extract a snapshot blob into `dest_dir` and open it read-only.
pub fn unpack(blob: &Path, dest_dir: &Path, password: &str) -> Result<ReadStore> {
    extract(blob, dest_dir, password)
        .with_context(|| format!("unpack snapshot {}", blob.display()))?;
    ReadStore::open(dest_dir)
}

/// Download the task's snapshot and open it as the reference store under
/// `<work_dir>/reference`. No blob yet -> empty store there.
pub fn fetch_reference<B: BlobStore + ?Sized>(
    blob: &B,
    task_id: &str,
    work_dir: &Path,
    password: &str,
) -> Result<ReadStore> {
    let dest = work_dir.join(REFERENCE_DIR);
    if dest.exists() {
        // left over from a failed run
        fs::remove_dir_all(&dest).map_err(|e| ErrorKind::filesystem(&dest, e))?;
    }
    let download = work_dir.join(REFERENCE_DOWNLOAD);
    let key = snapshot_key(task_id);

    match blob.get(&key, &download)? {
        Fetch::NotFound => {
            warn!(
                "snapshot: no {} yet, task {} starts from an empty reference",
                key, task_id
            );
            ReadStore::open(&dest)
        }
        Fetch::Found => {
            let store = unpack(&download, &dest, password)?;
            fs::remove_file(&download).map_err(|e| ErrorKind::filesystem(&download, e))?;
            info!(
                "snapshot: task {} reference loaded records={}",
                task_id,
                store.len()
            );
            Ok(store)
        }
    }
}
