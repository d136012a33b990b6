//! blob/local: BlobStore over a local directory (a mounted bucket, a NAS share, tests).
//!
//! Key "a/b.zip" lives at <root>/a/b.zip. Uploads go through tmp+rename so a reader never
//! sees a half-written object. The storage tier is only logged.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Component, Path, PathBuf};

use super::{BlobStore, Fetch};
use crate::config::StorageTier;

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("create blob root {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key; rejects absolute keys and "..".
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(anyhow!("invalid object key {:?}", key));
        }
        Ok(self.root.join(rel))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.object_path(key).map(|p| p.is_file()).unwrap_or(false)
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, local: &Path, tier: &StorageTier) -> Result<()> {
        let dst = self.object_path(key)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let tmp = dst.with_extension("uploading");
        let bytes = fs::copy(local, &tmp)
            .with_context(|| format!("copy {} -> {}", local.display(), tmp.display()))?;
        fs::rename(&tmp, &dst)
            .with_context(|| format!("rename {} -> {}", tmp.display(), dst.display()))?;
        info!(
            "blob: uploaded {} -> {} ({} bytes, tier={})",
            local.display(),
            key,
            bytes,
            tier
        );
        Ok(())
    }

    fn get(&self, key: &str, local: &Path) -> Result<Fetch> {
        let src = self.object_path(key)?;
        if !src.is_file() {
            debug!("blob: {} not found", key);
            return Ok(Fetch::NotFound);
        }
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let bytes = fs::copy(&src, local)
            .with_context(|| format!("copy {} -> {}", src.display(), local.display()))?;
        debug!("blob: downloaded {} -> {} ({} bytes)", key, local.display(), bytes);
        Ok(Fetch::Found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(tag: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("da-blob-{tag}-{}-{t}", std::process::id()))
    }

    #[test]
    fn put_get_and_not_found() {
        let base = root("pg");
        let store = LocalBlobStore::open(&base.join("remote")).unwrap();
        let src = base.join("src.bin");
        fs::write(&src, b"payload").unwrap();

        store.put("t1/a.zip", &src, &StorageTier::standard()).unwrap();
        assert!(store.exists("t1/a.zip"));

        let dst = base.join("down").join("a.zip");
        assert_eq!(store.get("t1/a.zip", &dst).unwrap(), Fetch::Found);
        assert_eq!(fs::read(&dst).unwrap(), b"payload");

        assert_eq!(
            store.get("t1/missing.zip", &base.join("x")).unwrap(),
            Fetch::NotFound
        );
        assert!(!base.join("x").exists());
    }

    #[test]
    fn rejects_escaping_keys() {
        let store = LocalBlobStore::open(&root("esc")).unwrap();
        assert!(store.object_path("../x").is_err());
        assert!(store.object_path("/etc/passwd").is_err());
        assert!(store.object_path("").is_err());
        assert!(store.object_path("a/b.zip").is_ok());
    }
}
