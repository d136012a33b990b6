//! util: small shared helpers (time, names, paths).

use anyhow::{anyhow, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in seconds.
#[inline]
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Unix seconds of a SystemTime; times before the epoch come out negative.
pub fn system_time_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => {
            let d = e.duration();
            // 1969-12-31T23:59:59.5 truncates toward -inf, i.e. to -1
            let secs = d.as_secs() as i64;
            if d.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}

/// UTC stamp used in archive names: 2025-07-20_02_03_39
pub fn utc_stamp(secs: i64) -> String {
    match time::OffsetDateTime::from_unix_timestamp(secs) {
        Ok(t) => format!(
            "{:04}-{:02}-{:02}_{:02}_{:02}_{:02}",
            t.year(),
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        ),
        Err(_) => format!("{secs}"),
    }
}

/// Random [A-Za-z0-9] string of length n.
pub fn rand_suffix(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Relative path of `path` under `root`, always with '/' separators.
pub fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        anyhow!(
            "{} is not under {}",
            path.display(),
            root.display()
        )
    })?;
    let mut out = String::new();
    for comp in rel.components() {
        let s = comp.as_os_str().to_str().ok_or_else(|| {
            anyhow!(
                "non UTF-8 name {:?} in {}",
                comp.as_os_str(),
                path.display()
            )
        })?;
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(s);
    }
    Ok(out)
}

/// Last path component as a String ("a/b/c.zip" -> "c.zip").
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
