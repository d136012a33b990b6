//! archive: zip chunks: writing (size-capped), naming and extraction.

pub mod chunk;
pub mod chunker;
pub mod dostime;
pub mod extract;

pub use chunk::Chunk;
pub use chunker::ChunkedArchiver;
pub use extract::extract;

/// `<task>_<stamp>_<suffix>[_<index>].zip`; spaces in the task id become '_', index 0 has no
/// suffix.
pub fn chunk_name(task_id: &str, stamp: &str, suffix: &str, index: u32) -> String {
    let task = crate::blob::task_prefix(task_id);
    if index == 0 {
        format!("{}_{}_{}.zip", task, stamp, suffix)
    } else {
        format!("{}_{}_{}_{}.zip", task, stamp, suffix, index)
    }
}
