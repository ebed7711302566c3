use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::catalog::InMemoryCatalog;
use crate::channel::{
    ChannelError, DeviceAddress, DeviceLink, FailureReason, LineChannel, QueryFailure, Timeouts,
    query_settings, query_statuses, validate_assignment, validate_command,
};
use crate::core::vocabulary::{DETAILED_SETTINGS, SETTINGS_TO_QUERY, STATUS_QUERIES, SettingDisplay, describe_setting};
use crate::core::{Diagnosis, EquipmentSelection, Goal, SettingValue, SettingsSnapshot};
use crate::logs;
use crate::recommend::Synthesis;
use crate::rules::SnapshotAnalysis;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeouts: Timeouts,
    pub show_progress: bool,
    pub dry_run: bool,
}

/// Entry point for every device and analysis operation. Holds only options and paths;
/// each live call opens its own connection.
#[derive(Debug, Clone)]
pub struct Engine {
    opts: EngineOptions,
    exports_dir: PathBuf,
    catalog: InMemoryCatalog,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsFetch {
    pub settings: SettingsSnapshot,
    pub failures: Vec<QueryFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyResult {
    pub key: String,
    pub value: SettingValue,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyResult {
    pub fn applied(key: &str, value: SettingValue, response: String) -> Self {
        Self {
            key: key.to_string(),
            value,
            applied: true,
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(key: &str, value: SettingValue, error: String) -> Self {
        Self {
            key: key.to_string(),
            value,
            applied: false,
            response: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub results: Vec<KeyResult>,
}

impl ApplyReport {
    pub fn all_applied(&self) -> bool {
        self.results.iter().all(|r| r.applied)
    }

    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.applied).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStatus {
    pub port: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusFetch {
    pub statuses: Vec<PortStatus>,
    pub failures: Vec<QueryFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedSettings {
    pub settings: Vec<SettingDisplay>,
    pub failures: Vec<QueryFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputState {
    pub connected: bool,
    pub signal: Option<String>,
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDetection {
    pub rx0: InputState,
    pub rx1: InputState,
    pub active_input: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupDocument {
    pub vrroom_backup: bool,
    pub version: &'static str,
    pub ip_address: String,
    pub timestamp: String,
    pub settings: SettingsSnapshot,
    pub status_snapshot: Vec<PortStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupReport {
    pub document: BackupDocument,
    pub failures: Vec<QueryFailure>,
    pub artifact: Option<String>,
}

impl Engine {
    pub fn new(opts: EngineOptions, exports_dir: PathBuf, catalog: InMemoryCatalog) -> Self {
        Self {
            opts,
            exports_dir,
            catalog,
        }
    }

    pub fn exports_dir(&self) -> &Path {
        &self.exports_dir
    }

    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    pub fn is_dry_run(&self) -> bool {
        self.opts.dry_run
    }

    fn open(&self, addr: &DeviceAddress) -> Result<LineChannel, ChannelError> {
        let mut channel = LineChannel::new(addr.clone(), self.opts.timeouts);
        channel.connect()?;
        Ok(channel)
    }

    fn spinner(&self, message: String) -> Option<indicatif::ProgressBar> {
        use std::io::IsTerminal;
        if !self.opts.show_progress || !std::io::stderr().is_terminal() {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }

    pub fn fetch_diagnosis(&self, addr: &DeviceAddress) -> Result<Diagnosis, ChannelError> {
        let pb = self.spinner(format!("Diagnosing signal chain on {addr}..."));
        let result = self.open(addr).map(|mut channel| {
            crate::diagnose::run_chain(&mut channel, &addr.to_string(), OffsetDateTime::now_utc())
        });
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        result
    }

    pub fn fetch_all_settings(&self, addr: &DeviceAddress) -> Result<SettingsFetch, ChannelError> {
        let pb = self.spinner(format!("Reading settings from {addr}..."));
        let result = self.open(addr).map(|mut channel| {
            let (settings, failures) = query_settings(&mut channel, &SETTINGS_TO_QUERY).into_snapshot();
            SettingsFetch { settings, failures }
        });
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        result
    }

    /// Sets every non-bookkeeping key independently; one failure does not stop the rest.
    pub fn apply_settings(
        &self,
        addr: &DeviceAddress,
        patch: &SettingsSnapshot,
    ) -> Result<ApplyReport, ChannelError> {
        let mut channel = self.open(addr)?;
        Ok(apply_to(&mut channel, patch))
    }

    pub fn analyze_snapshot(&self, snapshot: &SettingsSnapshot) -> SnapshotAnalysis {
        crate::rules::analyze_snapshot(snapshot)
    }

    /// Writes the corrected snapshot of `analysis` to the exports directory, unless dry-run.
    pub fn export_corrected(&self, analysis: &SnapshotAnalysis) -> Result<Option<PathBuf>> {
        if self.opts.dry_run {
            return Ok(None);
        }
        logs::write_artifact(&self.exports_dir, logs::OPTIMIZED_PREFIX, &analysis.corrected).map(Some)
    }

    pub fn synthesize(&self, selection: &EquipmentSelection, goals: &[Goal]) -> Result<Synthesis> {
        let mut synthesis = crate::recommend::synthesize(&self.catalog, selection, goals);
        if !synthesis.settings_patch.is_empty() && !self.opts.dry_run {
            let mut artifact = synthesis.settings_patch.clone();
            crate::rules::stamp(&mut artifact, OffsetDateTime::now_utc());
            let path = logs::write_artifact(&self.exports_dir, logs::RECOMMENDED_PREFIX, &artifact)
                .context("failed to write recommended settings")?;
            synthesis.artifact = Some(path.display().to_string());
        }
        Ok(synthesis)
    }

    pub fn fetch_status(&self, addr: &DeviceAddress) -> Result<StatusFetch, ChannelError> {
        let mut channel = self.open(addr)?;
        Ok(status_of(&mut channel))
    }

    pub fn fetch_settings_detailed(&self, addr: &DeviceAddress) -> Result<DetailedSettings, ChannelError> {
        let pb = self.spinner(format!("Reading settings from {addr}..."));
        let result = self.open(addr).map(|mut channel| {
            let batch = query_settings(&mut channel, &DETAILED_SETTINGS);
            DetailedSettings {
                settings: batch.items.iter().map(|(k, v)| describe_setting(k, v)).collect(),
                failures: batch.failures,
            }
        });
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        result
    }

    pub fn detect_inputs(&self, addr: &DeviceAddress) -> Result<InputDetection, ChannelError> {
        let mut channel = self.open(addr)?;
        Ok(detect_on(&mut channel))
    }

    pub fn backup(&self, addr: &DeviceAddress) -> Result<BackupReport> {
        let pb = self.spinner(format!("Backing up {addr}..."));
        let result = self.open(addr).map(|mut channel| {
            let (settings, mut failures) = query_settings(&mut channel, &SETTINGS_TO_QUERY).into_snapshot();
            let status = status_of(&mut channel);
            failures.extend(status.failures);
            (settings, status.statuses, failures)
        });
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let (settings, status_snapshot, failures) = result?;

        let document = BackupDocument {
            vrroom_backup: true,
            version: "1.0",
            ip_address: addr.host.clone(),
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            settings,
            status_snapshot,
        };
        let artifact = if self.opts.dry_run {
            None
        } else {
            let path = logs::write_artifact(&self.exports_dir, logs::BACKUP_PREFIX, &document)
                .context("failed to write backup")?;
            Some(path.display().to_string())
        };
        Ok(BackupReport {
            document,
            failures,
            artifact,
        })
    }

    /// Validated before any network I/O.
    pub fn send_raw_command(&self, addr: &DeviceAddress, command: &str) -> Result<String, ChannelError> {
        let command = validate_command(command)?;
        let mut channel = self.open(addr)?;
        channel.send_command(command)
    }
}

/// Every assignment is validated before the first line is written; rejected ones are
/// reported and never sent.
fn apply_to<L: DeviceLink + ?Sized>(link: &mut L, patch: &SettingsSnapshot) -> ApplyReport {
    let plan: Vec<_> = patch
        .settings()
        .map(|(key, value)| (key, value, validate_assignment(key, value)))
        .collect();
    let results = plan
        .into_iter()
        .map(|(key, value, line)| match line.and_then(|line| link.send_command(&line)) {
            Ok(response) => {
                debug!(key = %key, value = %value, "setting applied");
                KeyResult::applied(key, value.clone(), response)
            }
            Err(err @ ChannelError::UnsupportedCommand(_)) => {
                warn!(key = %key, error = %err, "setting rejected");
                KeyResult::failed(key, value.clone(), err.to_string())
            }
            Err(err) => {
                let reason = FailureReason::transport(&err);
                warn!(key = %key, reason = %reason, "setting not applied");
                KeyResult::failed(key, value.clone(), reason.to_string())
            }
        })
        .collect();
    ApplyReport { results }
}

fn status_of<L: DeviceLink + ?Sized>(link: &mut L) -> StatusFetch {
    let batch = query_statuses(link, &STATUS_QUERIES);
    StatusFetch {
        statuses: batch
            .items
            .into_iter()
            .map(|(port, response)| PortStatus { port, response })
            .collect(),
        failures: batch.failures,
    }
}

fn detect_on<L: DeviceLink + ?Sized>(link: &mut L) -> InputDetection {
    let mut probe = |port: &str| match link.get_status(port) {
        Ok(response) if !response.is_empty() && !response.to_lowercase().contains("no signal") => {
            InputState {
                connected: true,
                resolution: response.split_whitespace().next().map(str::to_string),
                signal: Some(response),
            }
        }
        Ok(_) => InputState::default(),
        Err(err) => {
            warn!(port, error = %err, "input probe failed");
            InputState::default()
        }
    };
    let rx0 = probe("rx0");
    let rx1 = probe("rx1");
    let active_input = link.get_setting("insel").ok().filter(|v| !v.is_empty());
    InputDetection {
        rx0,
        rx1,
        active_input,
    }
}
