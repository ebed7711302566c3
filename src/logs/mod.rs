use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use uuid::Uuid;

use crate::channel::DeviceAddress;
use crate::engine::{ApplyReport, KeyResult};

pub const RECOMMENDED_PREFIX: &str = "vrroom_recommended";
pub const OPTIMIZED_PREFIX: &str = "vrroom_optimized";
pub const BACKUP_PREFIX: &str = "vrroom_backup";

#[derive(Debug, Serialize)]
struct ApplyLog<'a> {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    started_at: String,
    finished_at: String,
    device: String,
    status: &'static str,
    results: &'a [KeyResult],
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    crate::config::config_dir(home_dir).join("logs")
}

/// `<prefix>_<8 hex>.json`; the random suffix keeps concurrent writers apart.
pub fn artifact_file_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}.json", &id[..8])
}

/// Writes `value` as pretty JSON under `dir` with a fresh artifact name.
pub fn write_artifact<T: Serialize + ?Sized>(dir: &Path, prefix: &str, value: &T) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create exports directory: {}", dir.display()))?;
    let path = dir.join(artifact_file_name(prefix));
    write_json(&path, value)?;
    info!(path = %path.display(), "artifact written");
    Ok(path)
}

pub fn write_apply_log(
    home_dir: &Path,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    device: &DeviceAddress,
    report: &ApplyReport,
) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("apply-{pid}-{ts}.json"));

    let log = ApplyLog {
        schema_version: "1",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: "apply",
        started_at: started_at.format(&Rfc3339).unwrap_or_default(),
        finished_at: finished_at.format(&Rfc3339).unwrap_or_default(),
        device: device.to_string(),
        status: if report.all_applied() { "ok" } else { "partial_error" },
        results: &report.results,
    };
    write_json(&path, &log)?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut s = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;
    s.push('\n');
    std::fs::write(path, s).with_context(|| format!("failed to write: {}", path.display()))
}
