//! store/read: ReadStore: the reference store of the previous run.
//!
//! Opened read-only. All segments are replayed into an ordered in-memory index on open
//! (later records win). There is no put: a reference store cannot be mutated mid-scan.
//!
//! Segment discovery:
//! - MANIFEST present: exactly the listed segments; any damage is an error.
//! - MANIFEST absent: segments found on disk, in numeric order; a partial tail is dropped with
//!   a warning (writer did not close). No segments at all -> empty store.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::ErrorKind;
use crate::lock::{lock_for_read, StoreLock};
use crate::sfile::SFile;

use super::manifest::read_manifest;
use super::segment::{parse_segment_name, read_record};

pub struct ReadStore {
    dir: PathBuf,
    index: BTreeMap<String, SFile>,
    _lock: StoreLock,
}

impl ReadStore {
    /// Open (or create, when missing) a store directory for reading.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| ErrorKind::StoreOpen(format!("create {}: {}", dir.display(), e)))?;
        let lock =
            lock_for_read(dir).map_err(|e| ErrorKind::StoreOpen(format!("{:#}", e)))?;

        let index = load_index(dir).map_err(|e| {
            ErrorKind::StoreOpen(format!("load {}: {:#}", dir.display(), e))
        })?;
        debug!("store: opened {} records={}", dir.display(), index.len());

        Ok(Self {
            dir: dir.to_path_buf(),
            index,
            _lock: lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Point lookup. None means "no prior record".
    pub fn get(&self, key: &str) -> Option<&SFile> {
        self.index.get(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SFile)> {
        self.index.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Release the handle and delete the directory (reference stores are discarded after use).
    pub fn discard(self) -> Result<()> {
        let dir = self.dir.clone();
        drop(self);
        fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))
    }
}

fn load_index(dir: &Path) -> Result<BTreeMap<String, SFile>> {
    let mut index = BTreeMap::new();
    match read_manifest(dir)? {
        Some(m) => {
            for name in &m.segments {
                replay_segment(&dir.join(name), true, &mut index)?;
            }
        }
        None => {
            let mut segs: Vec<(u32, PathBuf)> = Vec::new();
            for e in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
                let e = e?;
                let name = e.file_name();
                if let Some(no) = name.to_str().and_then(parse_segment_name) {
                    segs.push((no, e.path()));
                }
            }
            segs.sort_by_key(|(no, _)| *no);
            if !segs.is_empty() {
                warn!(
                    "store: {} has no MANIFEST, replaying {} segment(s) found on disk",
                    dir.display(),
                    segs.len()
                );
            }
            for (_, path) in segs {
                replay_segment(&path, false, &mut index)?;
            }
        }
    }
    Ok(index)
}

fn replay_segment(path: &Path, strict: bool, index: &mut BTreeMap<String, SFile>) -> Result<()> {
    let f = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("open segment {}", path.display()))?;
    let len = f.metadata()?.len();
    let mut r = BufReader::new(f);
    let mut pos = 0u64;

    // records are read back to back, the reader never needs to seek
    while pos < len {
        match read_record(&mut r, pos, len - pos)
            .with_context(|| format!("segment {}", path.display()))?
        {
            Some((rec, total)) => {
                let key = String::from_utf8(rec.key)
                    .with_context(|| format!("non UTF-8 key at off {} in {}", pos, path.display()))?;
                let file: SFile = serde_json::from_slice(&rec.val)
                    .with_context(|| format!("parse record {} in {}", key, path.display()))?;
                index.insert(key, file);
                pos += total;
            }
            None => {
                if strict {
                    return Err(anyhow::anyhow!(
                        "truncated record at off {} in {}",
                        pos,
                        path.display()
                    ));
                }
                warn!(
                    "store: partial tail at off {} in {}, ignoring {} byte(s)",
                    pos,
                    path.display(),
                    len - pos
                );
                break;
            }
        }
    }
    Ok(())
}
