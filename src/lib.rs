// Core records and helpers
pub mod error;
pub mod util;
pub mod sfile;
pub mod config;
pub mod report;
pub mod pattern;

// Snapshot store (src/store/{mod,segment,manifest,write,read}.rs) + LOCK
pub mod lock;
pub mod store;

// Pipeline stages
pub mod scan;
pub mod archive; // src/archive/{mod,chunk,chunker,dostime,extract}.rs
pub mod snapshot;
pub mod registry;
pub mod restore;
pub mod verify;

// Remote storage + orchestration
pub mod blob;
pub mod task;

pub use archive::{extract, ChunkedArchiver};
pub use blob::{BlobStore, Fetch, LocalBlobStore};
pub use config::{AccountConfig, BackupPlan, Password, StorageTier, TaskConfig, TaskContext};
pub use error::{kind_of, ErrorKind};
pub use report::{CountingReporter, LogReporter, Reporter, RunStats};
pub use scan::{ScanResult, Scanner};
pub use sfile::{SFile, ScannedFile};
pub use store::{ReadStore, WriteStore};
pub use task::{backup_task, restore_and_verify, run_backups, run_restores, view};
pub use verify::{verify, verify_report, Mismatch, VerifyReport};
