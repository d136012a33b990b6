//! store: embedded ordered key-value store for snapshot records.
//!
//! One record per relative file path (key) with the JSON-encoded SFile as value.
//!
//! Layout of a store directory:
//! - seg-NNNNNN.log: append-only record segments (see segment.rs)
//! - MANIFEST      : written on close (see manifest.rs)
//! - LOCK          : fs2 advisory lock, never packaged
//!
//! Two handle types with disjoint capabilities:
//! - WriteStore: create/put/close. Starts empty every run and ends up as a complete manifest of
//!   the scanned tree, not a delta.
//! - ReadStore: open/get/iter. The previous run's store; never mutated.

pub mod manifest;
pub mod read;
pub mod segment;
pub mod write;

pub use manifest::{StoreManifest, MANIFEST_FILE};
pub use read::ReadStore;
pub use write::WriteStore;

/// Segment rollover threshold.
pub const SEGMENT_ROTATE_BYTES: u64 = 4 * 1024 * 1024;
