use anyhow::{bail, Result};

use diffarchive::{AccountConfig, BackupPlan, TaskConfig};

use crate::cli::PlanArgs;

const MIB: u64 = 1024 * 1024;

/// Build the plan from --config and/or the inline task flags, then apply overrides.
pub fn load(args: &PlanArgs) -> Result<BackupPlan> {
    let mut plan = match &args.config {
        Some(path) => BackupPlan::from_json_file(path)?,
        None => BackupPlan::new(AccountConfig::from_env(), Vec::new()),
    };

    if let (Some(id), Some(dir)) = (&args.task, &args.dir) {
        let mut t = TaskConfig::new(id.clone(), dir.clone()).with_excludes(args.excludes.clone());
        if let Some(pw) = &args.password {
            t = t.with_password(pw.clone());
        }
        if let Some(tier) = &args.storage_tier {
            t = t.with_storage_tier(tier.clone());
        }
        plan.tasks.push(t);
    }

    if let Some(root) = &args.blob_root {
        plan.account.blob_root = root.clone();
    }
    if let Some(dir) = &args.work_dir {
        plan.account.working_dir = dir.clone();
    }
    if let Some(mb) = args.max_chunk_mb {
        plan.account.max_chunk_bytes = mb.saturating_mul(MIB);
    }

    if plan.tasks.is_empty() {
        bail!("no tasks: pass --config <plan.json> or --task <id> --dir <path>");
    }
    plan.validate()?;
    Ok(plan)
}

/// Keep only the task named by --only, if given.
pub fn select(mut plan: BackupPlan, only: Option<&str>) -> Result<BackupPlan> {
    if let Some(id) = only {
        plan.task(id)?;
        plan.tasks.retain(|t| t.id == id);
    }
    Ok(plan)
}
