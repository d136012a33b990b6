//! SFile: metadata record used for change detection.

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::PathBuf;

use crate::util::system_time_secs;

/// One file as seen by a scan pass. `path` (relative, '/'-separated) is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SFile {
    pub path: String,
    pub name: String,
    pub size: i64,
    pub mtime: i64,
}

impl SFile {
    pub fn from_metadata(rel_path: &str, name: &str, md: &Metadata) -> std::io::Result<Self> {
        Ok(Self {
            path: rel_path.to_string(),
            name: name.to_string(),
            size: md.len() as i64,
            mtime: system_time_secs(md.modified()?),
        })
    }

    /// Changed relative to a stored record: size, mtime (whole seconds) or name differ.
    pub fn differs_from(&self, prev: &SFile) -> bool {
        self.size != prev.size || self.mtime != prev.mtime || self.name != prev.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size.max(0) as u64
    }
}

/// Archiver input: absolute source path + its SFile.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub source: PathBuf,
    pub file: SFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf(size: i64, mtime: i64, name: &str) -> SFile {
        SFile {
            path: format!("dir/{name}"),
            name: name.to_string(),
            size,
            mtime,
        }
    }

    #[test]
    fn differs_on_each_field() {
        let base = sf(10, 100, "a.txt");
        assert!(!base.differs_from(&base.clone()));
        assert!(sf(11, 100, "a.txt").differs_from(&base));
        assert!(sf(10, 101, "a.txt").differs_from(&base));
        assert!(sf(10, 100, "A.txt").differs_from(&base));
    }

    #[test]
    fn json_field_names() {
        let s = serde_json::to_string(&sf(3, 7, "x")).unwrap();
        assert_eq!(s, r#"{"path":"dir/x","name":"x","size":3,"mtime":7}"#);
    }
}
