use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod plan;
mod cmd_backup;
mod cmd_restore;
mod cmd_view;
mod cmd_verify;

fn init_logger() {
    // RUST_LOG, default info
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Backup { only, json } =>
            cmd_backup::exec(&cli.plan, only, json),

        cli::Cmd::Restore { out, only, verify } =>
            cmd_restore::exec(&cli.plan, out, only, verify),

        cli::Cmd::View { only, json } =>
            cmd_view::exec(&cli.plan, only, json),

        cli::Cmd::Verify { source, restored, skips } =>
            cmd_verify::exec(source, restored, skips),
    }
}
