use anyhow::{bail, Result};
use std::path::PathBuf;

use diffarchive::task::run_restores;
use diffarchive::LocalBlobStore;

use crate::cli::PlanArgs;
use crate::plan;

pub fn exec(args: &PlanArgs, out: PathBuf, only: Option<String>, verify: bool) -> Result<()> {
    let plan = plan::select(plan::load(args)?, only.as_deref())?;
    let blob = LocalBlobStore::open(&plan.account.blob_root)?;

    let outcomes = run_restores(&plan, &blob, &out, verify)?;

    let mut failed = 0usize;
    for o in &outcomes {
        match &o.result {
            Ok(r) => {
                println!(
                    "{}: archives={} files={}",
                    r.task_id, r.restore.archives, r.restore.files
                );
                if let Some(v) = &r.verify {
                    if v.is_match() {
                        println!("  verify: OK (files={})", v.files_compared);
                    } else {
                        failed += 1;
                        println!("  verify: {} difference(s)", v.mismatches.len());
                        for m in &v.mismatches {
                            println!("    {}", m);
                        }
                    }
                }
            }
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
