//! extract: unpack one chunk (or snapshot blob) into a directory.
//!
//! Errors coming from the archive side (bad container, wrong/missing password, CRC mismatch while
//! inflating) are `ArchiveFormat`; errors creating or writing output files are `Filesystem`.
//! The copy loop is manual so the two sides can be told apart.

use anyhow::Result;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zip::ZipArchive;

use super::dostime::from_zip_datetime;
use crate::error::ErrorKind;

const COPY_BUF: usize = 64 * 1024;

/// Extract every entry of `archive` under `dest`, overwriting existing files and restoring entry
/// mtimes. Returns the number of files written.
pub fn extract(archive: &Path, dest: &Path, password: &str) -> Result<usize> {
    let f = File::open(archive).map_err(|e| ErrorKind::filesystem(archive, e))?;
    let mut zip = ZipArchive::new(f).map_err(|e| ErrorKind::archive(archive, e))?;
    fs::create_dir_all(dest).map_err(|e| ErrorKind::filesystem(dest, e))?;

    let mut files = 0usize;
    let mut buf = vec![0u8; COPY_BUF];
    for i in 0..zip.len() {
        let mut entry = if password.is_empty() {
            zip.by_index(i)
        } else {
            zip.by_index_decrypt(i, password.as_bytes())
        }
        .map_err(|e| ErrorKind::archive(archive, format!("entry #{}: {}", i, e)))?;

        let name = entry.name().to_string();
        let rel = entry.enclosed_name().ok_or_else(|| {
            ErrorKind::archive(archive, format!("entry {:?} escapes the output dir", name))
        })?;
        let out = dest.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| ErrorKind::filesystem(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| ErrorKind::filesystem(parent, e))?;
        }

        let mut w = BufWriter::new(File::create(&out).map_err(|e| ErrorKind::filesystem(&out, e))?);
        loop {
            let n = entry
                .read(&mut buf)
                .map_err(|e| ErrorKind::archive(archive, format!("entry {}: {}", name, e)))?;
            if n == 0 {
                break;
            }
            w.write_all(&buf[..n])
                .map_err(|e| ErrorKind::filesystem(&out, e))?;
        }
        let outf = w
            .into_inner()
            .map_err(|e| ErrorKind::filesystem(&out, e.error()))?;

        match entry.last_modified().and_then(|dt| from_zip_datetime(&dt)) {
            Some(secs) => {
                outf.set_modified(unix_to_system_time(secs))
                    .map_err(|e| ErrorKind::filesystem(&out, e))?;
            }
            None => warn!("extract: {} has no usable mtime", name),
        }
        files += 1;
    }
    debug!(
        "extract: {} -> {} files={}",
        archive.display(),
        dest.display(),
        files
    );
    Ok(files)
}

fn unix_to_system_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}
