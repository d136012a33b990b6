//! Configuration: shared account settings + per-task settings.
//!
//! - AccountConfig: working dir, default chunk cap, blob root. `from_env()` + fluent setters.
//!   Env: SDA_WORKING_DIR, SDA_MAX_CHUNK_MB, SDA_BLOB_ROOT.
//! - TaskConfig: one backup task (root dir, excludes, password, storage tier, cap override).
//! - TaskContext: a borrowed (account, task) pair. Task values never get merged into the
//!   account struct; accessors decide which one applies.
//! - BackupPlan: account + tasks, loadable from a JSON file.

use anyhow::{Context, Result};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

use crate::error::ErrorKind;

pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 100 * 1024 * 1024;
pub const STANDARD_TIER: &str = "STANDARD";

// ---------------- Password ----------------

/// Task password. Wiped on drop, never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Password(none)")
        } else {
            f.write_str("Password(***)")
        }
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// ---------------- StorageTier ----------------

/// Storage class label handed to the blob store ("STANDARD", "DEEP_ARCHIVE", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageTier(String);

impl StorageTier {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn standard() -> Self {
        Self(STANDARD_TIER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StorageTier {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------- AccountConfig ----------------

/// Settings shared by all tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Local scratch space; each task works in <working_dir>/<task_id>.
    /// Env: SDA_WORKING_DIR (default "./tmp")
    pub working_dir: PathBuf,

    /// Default chunk cap in bytes.
    /// Env: SDA_MAX_CHUNK_MB (megabytes, default 100)
    pub max_chunk_bytes: u64,

    /// Root directory of the local blob store.
    /// Env: SDA_BLOB_ROOT (default "./remote")
    pub blob_root: PathBuf,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./tmp"),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            blob_root: PathBuf::from("./remote"),
        }
    }
}

impl AccountConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SDA_WORKING_DIR") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.working_dir = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var("SDA_MAX_CHUNK_MB") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.max_chunk_bytes = n.saturating_mul(1024 * 1024);
            }
        }

        if let Ok(v) = std::env::var("SDA_BLOB_ROOT") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.blob_root = PathBuf::from(s);
            }
        }

        cfg
    }

    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_max_chunk_bytes(mut self, bytes: u64) -> Self {
        self.max_chunk_bytes = bytes;
        self
    }

    pub fn with_blob_root<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.blob_root = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.working_dir.as_os_str().is_empty() {
            return Err(ErrorKind::ConfigInvariant("working dir is required".into()).into());
        }
        if self.max_chunk_bytes == 0 {
            return Err(
                ErrorKind::ConfigInvariant("max chunk size must be greater than 0".into()).into(),
            );
        }
        Ok(())
    }
}

impl fmt::Display for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AccountConfig {{ working_dir: {}, max_chunk_bytes: {}, blob_root: {} }}",
            self.working_dir.display(),
            self.max_chunk_bytes,
            self.blob_root.display()
        )
    }
}

// ---------------- TaskConfig ----------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    pub dir: PathBuf,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub password: Password,
    #[serde(default)]
    pub storage_tier: StorageTier,
    /// Overrides AccountConfig::max_chunk_bytes when set.
    #[serde(default)]
    pub max_chunk_bytes: Option<u64>,
}

impl TaskConfig {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(id: S, dir: P) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
            excludes: Vec::new(),
            password: Password::default(),
            storage_tier: StorageTier::standard(),
            max_chunk_bytes: None,
        }
    }

    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_password<S: Into<String>>(mut self, pw: S) -> Self {
        self.password = Password::new(pw);
        self
    }

    pub fn with_storage_tier<S: Into<String>>(mut self, tier: S) -> Self {
        self.storage_tier = StorageTier::new(tier);
        self
    }

    pub fn with_max_chunk_bytes(mut self, bytes: Option<u64>) -> Self {
        self.max_chunk_bytes = bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ErrorKind::ConfigInvariant("task id is required".into()).into());
        }
        if self.dir.as_os_str().is_empty() {
            return Err(ErrorKind::ConfigInvariant(format!(
                "task {} base dir is required",
                self.id
            ))
            .into());
        }
        if self.max_chunk_bytes == Some(0) {
            return Err(ErrorKind::ConfigInvariant(format!(
                "task {} max chunk size must be greater than 0",
                self.id
            ))
            .into());
        }
        for p in &self.excludes {
            if p.is_empty() {
                return Err(ErrorKind::ConfigInvariant(format!(
                    "task {} has an empty exclude pattern",
                    self.id
                ))
                .into());
            }
            Glob::new(p).map_err(|e| {
                ErrorKind::ConfigInvariant(format!("task {} exclude {:?}: {}", self.id, p, e))
            })?;
        }
        Ok(())
    }
}

// ---------------- TaskContext ----------------

/// What a task run sees: shared settings plus its own.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub account: &'a AccountConfig,
    pub task: &'a TaskConfig,
}

impl<'a> TaskContext<'a> {
    pub fn new(account: &'a AccountConfig, task: &'a TaskConfig) -> Self {
        Self { account, task }
    }

    pub fn id(&self) -> &'a str {
        &self.task.id
    }

    pub fn root(&self) -> &'a Path {
        &self.task.dir
    }

    pub fn excludes(&self) -> &'a [String] {
        &self.task.excludes
    }

    pub fn password(&self) -> &'a str {
        self.task.password.as_str()
    }

    pub fn storage_tier(&self) -> &'a StorageTier {
        &self.task.storage_tier
    }

    pub fn max_chunk_bytes(&self) -> u64 {
        self.task
            .max_chunk_bytes
            .unwrap_or(self.account.max_chunk_bytes)
    }

    /// <working_dir>/<task prefix>, same name as the task's remote key prefix.
    pub fn task_work_dir(&self) -> PathBuf {
        self.account
            .working_dir
            .join(crate::blob::task_prefix(&self.task.id))
    }

    /// The task root must exist and be a directory.
    pub fn check_root(&self) -> Result<()> {
        let root = self.root();
        let md = std::fs::metadata(root).map_err(|e| {
            ErrorKind::ConfigInvariant(format!("task {} dir {}: {}", self.id(), root.display(), e))
        })?;
        if !md.is_dir() {
            return Err(ErrorKind::ConfigInvariant(format!(
                "task {} dir {} is not a directory",
                self.id(),
                root.display()
            ))
            .into());
        }
        Ok(())
    }
}

// ---------------- BackupPlan ----------------

/// Account settings and the task list, as loaded from a JSON file:
///
/// {
///   "account": {"working_dir": "./tmp", "max_chunk_bytes": 104857600, "blob_root": "./remote"},
///   "tasks": [{"id": "photos", "dir": "/data/photos", "excludes": ["**/.DS_Store"],
///              "password": "...", "storage_tier": "DEEP_ARCHIVE"}]
/// }
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPlan {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl BackupPlan {
    pub fn new(account: AccountConfig, tasks: Vec<TaskConfig>) -> Self {
        Self { account, tasks }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read config {}", path.display()))?;
        let plan: BackupPlan = serde_json::from_slice(&bytes)
            .map_err(|e| ErrorKind::ConfigInvariant(format!("{}: {}", path.display(), e)))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<()> {
        self.account.validate()?;
        let mut seen = HashSet::new();
        for t in &self.tasks {
            t.validate()?;
            if !seen.insert(t.id.as_str()) {
                return Err(
                    ErrorKind::ConfigInvariant(format!("duplicate task id {}", t.id)).into(),
                );
            }
        }
        Ok(())
    }

    pub fn task(&self, id: &str) -> Result<TaskContext<'_>> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| TaskContext::new(&self.account, t))
            .ok_or_else(|| ErrorKind::ConfigInvariant(format!("task {} not found", id)).into())
    }

    pub fn contexts(&self) -> impl Iterator<Item = TaskContext<'_>> {
        self.tasks
            .iter()
            .map(move |t| TaskContext::new(&self.account, t))
    }
}
