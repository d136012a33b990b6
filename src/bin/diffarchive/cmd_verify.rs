use anyhow::Result;
use std::path::PathBuf;

use diffarchive::verify_report;

pub fn exec(source: PathBuf, restored: PathBuf, skips: Vec<String>) -> Result<()> {
    let report = verify_report(&source, &restored, &skips)?;
    if report.is_match() {
        println!(
            "OK: {} file(s), {} dir(s) match",
            report.files_compared, report.dirs_compared
        );
        return Ok(());
    }
    for m in &report.mismatches {
        println!("{}", m);
    }
    report.into_result()
}
