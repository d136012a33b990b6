use anyhow::Result;

use diffarchive::{view, LocalBlobStore};

use crate::cli::PlanArgs;
use crate::plan;

pub fn exec(args: &PlanArgs, only: Option<String>, json: bool) -> Result<()> {
    let plan = plan::select(plan::load(args)?, only.as_deref())?;
    let blob = LocalBlobStore::open(&plan.account.blob_root)?;

    for ctx in plan.contexts() {
        let files = view(&ctx, &blob)?;
        if json {
            for f in &files {
                println!("{}", serde_json::to_string(f)?);
            }
            continue;
        }
        println!("{}: {} record(s)", ctx.id(), files.len());
        for f in &files {
            println!("  {}  size={}  mtime={}", f.path, f.size, f.mtime);
        }
    }
    Ok(())
}
