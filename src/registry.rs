//! registry: per-task ledger of uploaded archive names (`reg-<task>.txt`).
//!
//! Plain text, one archive file name per line, in upload order. The whole ledger is rewritten on
//! every append; concurrent appenders are not coordinated (last writer wins).

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::Path;

use crate::blob::{registry_key, BlobStore, Fetch};
use crate::config::StorageTier;
use crate::error::ErrorKind;

/// Archive names in ledger order. Missing ledger -> empty.
pub fn read<B: BlobStore + ?Sized>(blob: &B, task_id: &str, work_dir: &Path) -> Result<Vec<String>> {
    let key = registry_key(task_id);
    let local = work_dir.join(&key);
    let names = match blob.get(&key, &local)? {
        Fetch::NotFound => {
            debug!("registry: {} not found", key);
            Vec::new()
        }
        Fetch::Found => {
            let text = fs::read_to_string(&local)
                .with_context(|| format!("read registry {}", local.display()))?;
            fs::remove_file(&local).map_err(|e| ErrorKind::filesystem(&local, e))?;
            parse(&text)
        }
    };
    Ok(names)
}

/// Append `names` to the task's ledger and upload it. Empty input does nothing.
pub fn append<B: BlobStore + ?Sized, S: AsRef<str>>(
    blob: &B,
    task_id: &str,
    names: &[S],
    work_dir: &Path,
) -> Result<()> {
    if names.is_empty() {
        debug!("registry: nothing to append for task {}", task_id);
        return Ok(());
    }
    let mut all = read(blob, task_id, work_dir)?;
    all.extend(names.iter().map(|n| n.as_ref().to_string()));

    let key = registry_key(task_id);
    let local = work_dir.join(&key);
    fs::create_dir_all(work_dir).map_err(|e| ErrorKind::filesystem(work_dir, e))?;
    fs::write(&local, render(&all)).map_err(|e| ErrorKind::filesystem(&local, e))?;
    blob.put(&key, &local, &StorageTier::standard())
        .with_context(|| format!("upload registry {}", key))?;
    fs::remove_file(&local).map_err(|e| ErrorKind::filesystem(&local, e))?;

    info!(
        "registry: task {} +{} archive(s), total={}",
        task_id,
        names.len(),
        all.len()
    );
    Ok(())
}

fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn render(names: &[String]) -> String {
    let mut s = String::new();
    for n in names {
        s.push_str(n);
        s.push('\n');
    }
    s
}
