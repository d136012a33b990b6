//! Chunk: one zip container being filled.
//!
//! Lifecycle: open -> write_file* -> flush. A chunk that never received an entry is removed on
//! flush, so callers never see empty archives.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::dostime::to_zip_datetime;
use crate::error::ErrorKind;

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

pub struct Chunk {
    path: PathBuf,
    index: u32,
    zip: ZipWriter<File>,
    bytes: u64,
    entries: u64,
}

impl Chunk {
    /// Create (truncate) the chunk file at `path`.
    pub fn open(path: &Path, index: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ErrorKind::filesystem(parent, e))?;
        }
        let f = File::create(path).map_err(|e| ErrorKind::filesystem(path, e))?;
        debug!("archive: opened chunk #{} {}", index, path.display());
        Ok(Self {
            path: path.to_path_buf(),
            index,
            zip: ZipWriter::new(f),
            bytes: 0,
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Sum of the declared sizes of the entries written so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Add `src` as a deflated entry named `entry_name`. An empty password means no encryption.
    /// `size` is what gets counted against the chunk cap.
    pub fn write_file(
        &mut self,
        src: &Path,
        entry_name: &str,
        mtime: i64,
        size: u64,
        password: &str,
    ) -> Result<()> {
        let base = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(to_zip_datetime(mtime))
            .large_file(size >= ZIP64_THRESHOLD);
        let options = if password.is_empty() {
            base
        } else {
            base.with_deprecated_encryption(password.as_bytes())
        };

        let f = File::open(src).map_err(|e| ErrorKind::filesystem(src, e))?;
        self.zip
            .start_file(entry_name, options)
            .map_err(|e| ErrorKind::filesystem(&self.path, e))
            .with_context(|| format!("start entry {}", entry_name))?;
        let copied = io::copy(&mut BufReader::new(f), &mut self.zip)
            .map_err(|e| ErrorKind::filesystem(src, e))
            .with_context(|| format!("zip {} into {}", src.display(), self.path.display()))?;
        if copied != size {
            warn!(
                "archive: {} changed since scan (scanned={} zipped={})",
                src.display(),
                size,
                copied
            );
        }

        self.bytes = self.bytes.saturating_add(size);
        self.entries += 1;
        Ok(())
    }

    /// Finish the container. Returns None (and removes the file) when nothing was written.
    pub fn flush(self) -> Result<Option<PathBuf>> {
        let Chunk {
            path,
            index,
            zip,
            entries,
            ..
        } = self;
        let f = zip
            .finish()
            .map_err(|e| ErrorKind::filesystem(&path, e))
            .with_context(|| format!("finish chunk {}", path.display()))?;
        if entries == 0 {
            drop(f);
            fs::remove_file(&path).map_err(|e| ErrorKind::filesystem(&path, e))?;
            debug!("archive: discarded empty chunk #{} {}", index, path.display());
            return Ok(None);
        }
        f.sync_all().map_err(|e| ErrorKind::filesystem(&path, e))?;
        Ok(Some(path))
    }
}
