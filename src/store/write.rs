//! store/write: WriteStore: the fresh manifest built during a scan.
//!
//! Only appends. Segments roll over at SEGMENT_ROTATE_BYTES. `close()` fsyncs the open
//! segment, writes MANIFEST and drops the lock; it must finish before the directory is packaged.

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ErrorKind;
use crate::lock::{lock_for_write, StoreLock};
use crate::sfile::SFile;

use super::manifest::{write_manifest, StoreManifest};
use super::segment::{segment_name, write_record};
use super::SEGMENT_ROTATE_BYTES;

pub struct WriteStore {
    dir: PathBuf,
    seg_no: u32,
    seg_bytes: u64,
    out: Option<BufWriter<File>>,
    segments: Vec<String>,
    records: u64,
    rotate_at: u64,
    _lock: StoreLock,
}

impl WriteStore {
    /// Create a store rooted at `dir`. The directory must be empty or absent: a write store
    /// always starts from nothing.
    pub fn create(dir: &Path) -> Result<Self> {
        Self::create_with_rotation(dir, SEGMENT_ROTATE_BYTES)
    }

    pub fn create_with_rotation(dir: &Path, rotate_at: u64) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| ErrorKind::StoreOpen(format!("create {}: {}", dir.display(), e)))?;
        let has_data = fs::read_dir(dir)
            .map_err(|e| ErrorKind::StoreOpen(format!("read_dir {}: {}", dir.display(), e)))?
            .filter_map(|e| e.ok())
            .any(|e| e.file_name() != crate::lock::LOCK_FILE);
        if has_data {
            return Err(ErrorKind::StoreOpen(format!(
                "write store dir {} is not empty",
                dir.display()
            ))
            .into());
        }
        let lock = lock_for_write(dir)
            .map_err(|e| ErrorKind::StoreOpen(format!("{:#}", e)))?;

        debug!("store: create write store at {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            seg_no: 0,
            seg_bytes: 0,
            out: None,
            segments: Vec::new(),
            records: 0,
            rotate_at: rotate_at.max(1),
            _lock: lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Records appended so far (puts of the same key count each time).
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Upsert; the last put for a key wins when the store is read back.
    pub fn put(&mut self, key: &str, file: &SFile) -> Result<()> {
        let val = serde_json::to_vec(file).context("serialize SFile")?;
        if self.out.is_none() || self.seg_bytes >= self.rotate_at {
            self.roll_segment()?;
        }
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| anyhow!("write store has no open segment"))?;
        let n = write_record(out, key.as_bytes(), &val)
            .with_context(|| format!("append record {key} to {}", self.dir.display()))?;
        self.seg_bytes += n;
        self.records += 1;
        Ok(())
    }

    fn roll_segment(&mut self) -> Result<()> {
        self.finish_segment()?;
        self.seg_no += 1;
        let name = segment_name(self.seg_no);
        let path = self.dir.join(&name);
        let f = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("create segment {}", path.display()))?;
        self.out = Some(BufWriter::new(f));
        self.segments.push(name);
        self.seg_bytes = 0;
        Ok(())
    }

    fn finish_segment(&mut self) -> Result<()> {
        if let Some(mut w) = self.out.take() {
            w.flush()?;
            let f = w.into_inner().map_err(|e| anyhow!("flush segment: {}", e))?;
            f.sync_all()?;
        }
        Ok(())
    }

    /// Flush everything, write MANIFEST and release the directory. Returns the store dir.
    pub fn close(mut self) -> Result<PathBuf> {
        self.finish_segment()
            .with_context(|| format!("close segment in {}", self.dir.display()))?;
        let m = StoreManifest::new(std::mem::take(&mut self.segments), self.records);
        write_manifest(&self.dir, &m)?;
        debug!(
            "store: closed {} segments={} records={}",
            self.dir.display(),
            m.segments.len(),
            m.records
        );
        Ok(self.dir.clone())
    }
}
