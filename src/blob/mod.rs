//! blob: remote object storage as seen by the backup core.
//!
//! The transport itself is out of scope; the core only needs put/get of whole files, and a
//! `get` that tells "object does not exist" apart from real failures (first run of a task has
//! no snapshot and no registry yet).

use anyhow::Result;
use std::path::Path;

use crate::config::StorageTier;

pub mod local;

pub use local::LocalBlobStore;

/// Outcome of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Found,
    NotFound,
}

impl Fetch {
    pub fn is_found(self) -> bool {
        matches!(self, Fetch::Found)
    }
}

pub trait BlobStore {
    /// Upload `local` under `key` with the given storage tier. Overwrites.
    fn put(&self, key: &str, local: &Path, tier: &StorageTier) -> Result<()>;

    /// Download `key` into `local` (parent dirs are created). NotFound is not an error.
    fn get(&self, key: &str, local: &Path) -> Result<Fetch>;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn put(&self, key: &str, local: &Path, tier: &StorageTier) -> Result<()> {
        (**self).put(key, local, tier)
    }

    fn get(&self, key: &str, local: &Path) -> Result<Fetch> {
        (**self).get(key, local)
    }
}

// ---------------- key layout ----------------

pub const SNAPSHOT_BLOB_NAME: &str = "db.zip";

/// Spaces are not welcome in object keys.
pub fn task_prefix(task_id: &str) -> String {
    task_id.trim().replace(' ', "_")
}

/// <task>/<archive name>
pub fn archive_key(task_id: &str, archive_name: &str) -> String {
    format!("{}/{}", task_prefix(task_id), archive_name)
}

/// <task>/db.zip
pub fn snapshot_key(task_id: &str) -> String {
    format!("{}/{}", task_prefix(task_id), SNAPSHOT_BLOB_NAME)
}

/// reg-<task>.txt
pub fn registry_key(task_id: &str) -> String {
    format!("reg-{}.txt", task_prefix(task_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(archive_key("my photos", "a.zip"), "my_photos/a.zip");
        assert_eq!(snapshot_key("docs"), "docs/db.zip");
        assert_eq!(registry_key("docs"), "reg-docs.txt");
    }
}
