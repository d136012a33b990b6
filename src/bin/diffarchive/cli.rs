use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Incremental backups of directory trees into size-capped zip chunks
#[derive(Parser, Debug)]
#[command(name = "diffarchive", version, about = "diffarchive CLI")]
pub struct Cli {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Where the task list comes from: a JSON plan, or a single task given inline.
/// Account settings not in the plan fall back to SDA_* env vars.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// JSON plan {"account": {...}, "tasks": [...]}
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline task id (with --dir)
    #[arg(long, global = true, requires = "dir")]
    pub task: Option<String>,

    /// Inline task root
    #[arg(long, global = true, requires = "task")]
    pub dir: Option<PathBuf>,

    /// Inline task exclude glob (repeatable)
    #[arg(long = "exclude", global = true)]
    pub excludes: Vec<String>,

    /// Inline task archive password (also SDA_PASSWORD)
    #[arg(long, global = true, env = "SDA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Inline task storage tier for chunks
    #[arg(long, global = true)]
    pub storage_tier: Option<String>,

    /// Override blob root
    #[arg(long, global = true)]
    pub blob_root: Option<PathBuf>,

    /// Override working dir
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Override chunk cap (MiB)
    #[arg(long, global = true)]
    pub max_chunk_mb: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Back up every task (or --only one)
    Backup {
        #[arg(long)]
        only: Option<String>,
        /// Print per-task summaries as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Restore tasks into <out>/<task>
    Restore {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        only: Option<String>,
        /// Compare each restored tree with its source
        #[arg(long, default_value_t = false)]
        verify: bool,
    },
    /// List the records of a task's latest snapshot
    View {
        #[arg(long)]
        only: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Compare two directory trees
    Verify {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        restored: PathBuf,
        /// Skip glob (repeatable)
        #[arg(long = "skip")]
        skips: Vec<String>,
    },
}
