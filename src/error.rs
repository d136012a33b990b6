//! Error kinds for the backup pipeline.
//!
//! Everything fallible returns `anyhow::Result`. Where the caller has to tell failures apart
//! (restore aborting on a bad archive, config checks before a run), the root cause is one of the
//! `ErrorKind` variants below, and `kind_of()` recovers it through any amount of `.context(..)`.
//!
//! There is no "not found" kind: store lookups return `Option`, blob fetches return
//! `blob::Fetch::NotFound`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Snapshot store directory could not be opened/created, or its segments are corrupt.
    #[error("store open failed: {0}")]
    StoreOpen(String),

    /// stat/read/write failure while scanning, archiving or extracting.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// Task root is not a directory, a required setting is missing, a glob does not compile.
    #[error("config invariant violated: {0}")]
    ConfigInvariant(String),

    /// Corrupt archive, wrong password, entry CRC mismatch.
    #[error("archive format error: {0}")]
    ArchiveFormat(String),

    /// Restored tree differs from the source.
    #[error("verification mismatch: {0}")]
    VerificationMismatch(String),
}

impl ErrorKind {
    pub fn filesystem(path: &std::path::Path, e: impl std::fmt::Display) -> Self {
        ErrorKind::Filesystem(format!("{}: {}", path.display(), e))
    }

    pub fn archive(path: &std::path::Path, e: impl std::fmt::Display) -> Self {
        ErrorKind::ArchiveFormat(format!("{}: {}", path.display(), e))
    }
}

/// Find the `ErrorKind` carried somewhere in the error chain.
pub fn kind_of(err: &anyhow::Error) -> Option<&ErrorKind> {
    err.chain().find_map(|e| e.downcast_ref::<ErrorKind>())
}

pub fn is_archive_format(err: &anyhow::Error) -> bool {
    matches!(kind_of(err), Some(ErrorKind::ArchiveFormat(_)))
}
