//! store/manifest: MANIFEST of a closed store (JSON, tmp+rename).
//!
//! {"version":1,"segments":["seg-000001.log", ...],"records":123}
//!
//! A store without MANIFEST and without segments is empty (fresh directory, bootstrap).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "MANIFEST";
pub const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub version: u32,
    pub segments: Vec<String>,
    pub records: u64,
}

impl StoreManifest {
    pub fn new(segments: Vec<String>, records: u64) -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            segments,
            records,
        }
    }
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

pub fn write_manifest(dir: &Path, m: &StoreManifest) -> Result<()> {
    let path = manifest_path(dir);
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_vec_pretty(m).context("serialize store manifest")?;
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open tmp manifest {}", tmp.display()))?;
        f.write_all(&json)?;
        f.sync_all()
            .with_context(|| format!("fsync {}", tmp.display()))?;
    }
    fs::rename(&tmp, &path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// None when the directory has no MANIFEST.
pub fn read_manifest(dir: &Path) -> Result<Option<StoreManifest>> {
    let path = manifest_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let m: StoreManifest =
        serde_json::from_slice(&bytes).context("parse store manifest json")?;
    if m.version != STORE_FORMAT_VERSION {
        return Err(anyhow!(
            "unsupported store format version {} (expected {})",
            m.version,
            STORE_FORMAT_VERSION
        ));
    }
    Ok(Some(m))
}
