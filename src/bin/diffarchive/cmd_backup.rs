use anyhow::{bail, Result};

use diffarchive::{run_backups, LocalBlobStore, LogReporter};

use crate::cli::PlanArgs;
use crate::plan;

pub fn exec(args: &PlanArgs, only: Option<String>, json: bool) -> Result<()> {
    let plan = plan::select(plan::load(args)?, only.as_deref())?;
    log::info!("backup: {}", plan.account);
    let blob = LocalBlobStore::open(&plan.account.blob_root)?;

    let outcomes = run_backups(&plan, &blob, &LogReporter)?;

    let mut failed = 0usize;
    for o in &outcomes {
        match &o.result {
            Ok(s) if json => {
                let v = serde_json::json!({
                    "task": s.task_id,
                    "scanned": s.stats.scanned,
                    "changed": s.stats.changed,
                    "skipped": s.stats.skipped,
                    "archived_bytes": s.stats.archived_bytes,
                    "archives": s.archives,
                });
                println!("{}", serde_json::to_string(&v)?);
            }
            Ok(s) => println!(
                "{}: scanned={} changed={} skipped={} bytes={} archives={}",
                s.task_id,
                s.stats.scanned,
                s.stats.changed,
                s.stats.skipped,
                s.stats.archived_bytes,
                s.archives.len()
            ),
            Err(e) => {
                failed += 1;
                println!("{}: FAILED: {:#}", o.task_id, e);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} task(s) failed", failed, outcomes.len());
    }
    Ok(())
}
