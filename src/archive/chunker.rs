//! ChunkedArchiver: split the updated files of one scan into size-capped zip chunks.
//!
//! Flush rule: before writing a file, if the open chunk already holds an entry and
//! `bytes + size > max_bytes`, the chunk is finished and the next index opened. A single file
//! larger than the cap therefore lands alone in its own chunk; files are never split.

use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use super::chunk::Chunk;
use super::chunk_name;
use crate::report::Reporter;
use crate::sfile::ScannedFile;
use crate::util::{now_secs, rand_suffix, utc_stamp};

const NAME_SUFFIX_LEN: usize = 5;

pub struct ChunkedArchiver<'r> {
    out_dir: PathBuf,
    task_id: String,
    max_bytes: u64,
    password: String,
    stamp: String,
    suffix: String,
    reporter: &'r dyn Reporter,
}

impl<'r> ChunkedArchiver<'r> {
    pub fn new(
        out_dir: &Path,
        task_id: &str,
        max_bytes: u64,
        password: &str,
        reporter: &'r dyn Reporter,
    ) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            task_id: task_id.to_string(),
            max_bytes,
            password: password.to_string(),
            stamp: utc_stamp(now_secs()),
            suffix: rand_suffix(NAME_SUFFIX_LEN),
            reporter,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// File name of chunk `index` for this run.
    pub fn chunk_file_name(&self, index: u32) -> String {
        chunk_name(&self.task_id, &self.stamp, &self.suffix, index)
    }

    /// Archive `files` in order. Returns the chunk paths in creation order; empty input gives
    /// an empty vec and leaves no file behind.
    pub fn archive(&self, files: &[ScannedFile]) -> Result<Vec<PathBuf>> {
        let total = files.len() as u64;
        let mut out = Vec::new();
        let mut chunk: Option<Chunk> = None;
        let mut next_index: u32 = 0;
        let mut done: u64 = 0;
        let mut done_bytes: u64 = 0;

        for sf in files {
            let size = sf.file.size_bytes();

            let must_flush = chunk.as_ref().is_some_and(|c| {
                c.entries() > 0 && c.bytes().saturating_add(size) > self.max_bytes
            });
            if must_flush {
                if let Some(c) = chunk.take() {
                    self.finish(c, &mut out)?;
                }
            }

            if chunk.is_none() {
                let path = self.out_dir.join(self.chunk_file_name(next_index));
                chunk = Some(Chunk::open(&path, next_index)?);
                next_index += 1;
            }
            if let Some(c) = chunk.as_mut() {
                c.write_file(&sf.source, &sf.file.path, sf.file.mtime, size, &self.password)
                    .with_context(|| format!("archive {}", sf.file.path))?;
            }

            done += 1;
            done_bytes = done_bytes.saturating_add(size);
            self.reporter.on_archive_progress(done, total, done_bytes);
        }

        if let Some(c) = chunk.take() {
            self.finish(c, &mut out)?;
        }

        info!(
            "archive: task={} files={} bytes={} chunks={} cap={}",
            self.task_id,
            done,
            done_bytes,
            out.len(),
            self.max_bytes
        );
        Ok(out)
    }

    fn finish(&self, c: Chunk, out: &mut Vec<PathBuf>) -> Result<()> {
        let index = c.index();
        let entries = c.entries();
        let bytes = c.bytes();
        if let Some(path) = c.flush()? {
            self.reporter.on_chunk_flushed(index, entries, bytes, &path);
            out.push(path);
        }
        Ok(())
    }
}
