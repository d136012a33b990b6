//! Ordered exclude/skip globs.
//!
//! Scan excludes match the '/'-separated relative path only: "a.txt" is the root file, not every
//! file named a.txt. Verify skips also accept the bare entry name, so ".DS_Store" is skipped at
//! any depth. `*` crosses directory separators (globset default).

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ErrorKind;

#[derive(Debug, Clone)]
pub struct PatternList {
    patterns: Vec<String>,
    set: GlobSet,
}

impl PatternList {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut b = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for p in patterns {
            let p = p.as_ref();
            let glob = Glob::new(p)
                .map_err(|e| ErrorKind::ConfigInvariant(format!("pattern {:?}: {}", p, e)))?;
            b.add(glob);
            kept.push(p.to_string());
        }
        let set = b
            .build()
            .map_err(|e| ErrorKind::ConfigInvariant(format!("build pattern set: {}", e)))?;
        Ok(Self {
            patterns: kept,
            set,
        })
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// First pattern (in configured order) matching the relative path, if any.
    pub fn first_match(&self, rel_path: &str) -> Option<&str> {
        self.set
            .matches(rel_path)
            .into_iter()
            .min()
            .map(|i| self.patterns[i].as_str())
    }

    pub fn is_match(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }

    /// Matches the relative path or its last component.
    pub fn is_match_path_or_name(&self, rel_path: &str) -> bool {
        if self.set.is_match(rel_path) {
            return true;
        }
        match rel_path.rsplit_once('/') {
            Some((_, name)) => self.set.is_match(name),
            None => false,
        }
    }
}
