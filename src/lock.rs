//! Advisory locking of a snapshot store directory (fs2).
//!
//! - Exclusive: the single write store of a run. Taken with try-lock so a second writer on the
//!   same directory fails immediately instead of waiting.
//! - Shared: read-only reference stores.
//!
//! Lock file path: <store_dir>/LOCK. Released on Drop. The LOCK file is never packaged.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "LOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl StoreLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // unlock errors on drop are ignored
        let _ = self.file.unlock();
    }
}

fn open_lock_file(dir: &Path) -> Result<(File, PathBuf)> {
    let path = dir.join(LOCK_FILE);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    Ok((f, path))
}

/// Exclusive lock for a write store; errors if somebody else holds the directory.
pub fn lock_for_write(dir: &Path) -> Result<StoreLock> {
    let (file, path) = open_lock_file(dir)?;
    file.try_lock_exclusive()
        .with_context(|| format!("store is in use, try_lock_exclusive {}", path.display()))?;
    Ok(StoreLock {
        file,
        path,
        mode: LockMode::Exclusive,
    })
}

/// Shared lock for a read-only reference store. Blocks while a writer holds it.
pub fn lock_for_read(dir: &Path) -> Result<StoreLock> {
    let (file, path) = open_lock_file(dir)?;
    file.lock_shared()
        .with_context(|| format!("lock_shared {}", path.display()))?;
    Ok(StoreLock {
        file,
        path,
        mode: LockMode::Shared,
    })
}
