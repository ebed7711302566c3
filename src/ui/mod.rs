use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::catalog::CatalogEntry;
use crate::channel::QueryFailure;
use crate::core::{
    ChainStage, Diagnosis, Goal, Issue, Recommendation, SettingsSnapshot, Severity, StageKind,
};
use crate::engine::{ApplyReport, BackupReport, DetailedSettings, InputDetection, InputState, StatusFetch};
use crate::recommend::{ConfigSuggestion, Synthesis};
use crate::rules::SnapshotAnalysis;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "causes:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next steps:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for wire-level detail");
    let _ = writeln!(
        stderr,
        "  - check the device address (`--host`/`--port` or [device] in the config)"
    );
    let _ = writeln!(stderr, "  - see `avlab --help` for commands and options");
}

pub fn print_diagnosis(d: &Diagnosis, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "Signal chain on {} ({})", d.device, d.generated_at);
    let _ = writeln!(out);
    print_chain_table(&mut out, &d.signal_chain, cfg);

    let hdr = &d.hdr_status;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "HDR: input={}{}  lldv={}  inject={}  output={}",
        hdr.input.format,
        if hdr.input.detected { "" } else { " (none detected)" },
        on_off(hdr.processing.lldv_active),
        on_off(hdr.processing.hdr_inject),
        hdr.output.format
    );
    if !d.settings.is_empty() {
        let line = d
            .settings
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "EDID/HDR settings: {line}");
    }

    print_issues(&mut out, &d.issues, cfg);
    print_recommendations(&mut out, &d.recommendations, cfg);
}

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

fn print_chain_table(out: &mut dyn Write, chain: &[ChainStage], cfg: &UiConfig) {
    let stage_w = chain
        .iter()
        .map(|s| visible_width_ansi(&s.stage))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi("stage"));
    let port_w = chain
        .iter()
        .map(|s| visible_width_ansi(&s.port))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi("port"));
    let state_w = "disconnected".len();

    let _ = writeln!(
        out,
        "{}  {}  {}  detail",
        pad_end_display("stage", stage_w),
        pad_end_display("port", port_w),
        pad_end_display("state", state_w)
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        "-".repeat(stage_w),
        "-".repeat(port_w),
        "-".repeat(state_w),
        "-".repeat(6)
    );
    for stage in chain {
        let (state, detail) = stage_cells(stage, cfg.color);
        let _ = writeln!(
            out,
            "{}  {}  {}  {detail}",
            pad_end_display(&stage.stage, stage_w),
            pad_end_display(&stage.port, port_w),
            pad_end_ansi(&state, state_w)
        );
    }
}

fn stage_cells(stage: &ChainStage, color: bool) -> (String, String) {
    if let Some(err) = &stage.error {
        return (paint("error", "31", color), err.clone());
    }
    match stage.kind {
        StageKind::Metadata => {
            let spd = stage.spd.clone().unwrap_or_default();
            let detail = [
                spd.vendor,
                spd.product,
                spd.hdr_metadata.map(|m| m.as_str().to_string()),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / ");
            ("metadata".to_string(), detail)
        }
        StageKind::Sink => {
            let caps = stage.sink.clone().unwrap_or_default();
            let mut flags = Vec::new();
            if caps.hdr_capable {
                flags.push("HDR");
            }
            if caps.dv_capable {
                flags.push("DV");
            }
            if caps.vrr_capable {
                flags.push("VRR");
            }
            let mut detail = flags.join(",");
            if let Some(max) = caps.max_resolution {
                detail = format!("{detail} max {max}").trim().to_string();
            }
            ("sink".to_string(), detail)
        }
        StageKind::Input | StageKind::Output => match &stage.signal {
            Some(signal) if stage.connected => (paint("connected", "32", color), signal.summary()),
            _ => (
                paint("disconnected", "90", color),
                stage.raw.clone().unwrap_or_default(),
            ),
        },
    }
}

fn print_issues(out: &mut dyn Write, issues: &[Issue], cfg: &UiConfig) {
    let _ = writeln!(out);
    if issues.is_empty() {
        let _ = writeln!(out, "No issues found.");
        return;
    }
    let _ = writeln!(out, "Issues ({}):", issues.len());
    for issue in issues.iter().take(cfg.max_table_rows) {
        let _ = writeln!(out, "- [{}] {}", format_severity(issue.severity, cfg.color), issue.title);
        let _ = writeln!(out, "  {}", issue.description);
        if let (Some(key), Some(cur), Some(rec)) =
            (&issue.setting, &issue.current_value, &issue.recommended_value)
        {
            let _ = writeln!(out, "  {key}: {cur} -> {rec}");
        }
    }
    print_more(out, issues.len(), cfg.max_table_rows);
}

fn print_recommendations(out: &mut dyn Write, recs: &[Recommendation], cfg: &UiConfig) {
    if recs.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommendations ({}):", recs.len());
    for rec in recs.iter().take(cfg.max_table_rows) {
        let _ = writeln!(out, "- [{}] {}", format_severity(rec.severity, cfg.color), rec.title);
        if cfg.verbose || rec.description.len() <= 160 {
            let _ = writeln!(out, "  {}", rec.description);
        }
        if let Some(path) = &rec.menu_path {
            let _ = writeln!(out, "  where: {path}");
        }
        if let Some(cmd) = &rec.command {
            let _ = writeln!(out, "  command: {cmd}");
        }
    }
    print_more(out, recs.len(), cfg.max_table_rows);
}

fn print_more(out: &mut dyn Write, total: usize, shown: usize) {
    if total > shown {
        let _ = writeln!(out, "  ... ({} more; use --json for the full list)", total - shown);
    }
}

fn print_failures(out: &mut dyn Write, failures: &[QueryFailure], cfg: &UiConfig) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Skipped ({}):", failures.len());
    for failure in failures.iter().take(if cfg.verbose { usize::MAX } else { cfg.max_table_rows }) {
        let _ = writeln!(out, "- {failure}");
    }
}

pub fn print_settings(settings: &SettingsSnapshot, failures: &[QueryFailure], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let key_w = settings.iter().map(|(k, _)| visible_width_ansi(k)).max().unwrap_or(0);
    for (key, value) in settings.iter() {
        let _ = writeln!(out, "{}  {value}", pad_end_display(key, key_w));
    }
    print_failures(&mut out, failures, cfg);
}

pub fn print_detailed_settings(detailed: &DetailedSettings, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let name_w = detailed
        .settings
        .iter()
        .map(|s| visible_width_ansi(&s.name))
        .max()
        .unwrap_or(0);
    for s in &detailed.settings {
        let value = if s.is_set {
            paint(&s.display_value, "32", cfg.color)
        } else {
            s.display_value.clone()
        };
        let _ = writeln!(out, "{}  {value}", pad_end_display(&s.name, name_w));
        if cfg.verbose {
            let _ = writeln!(out, "{}  {} [{}] {}", " ".repeat(name_w), s.menu_path, s.tab, s.key);
        }
    }
    print_failures(&mut out, &detailed.failures, cfg);
}

pub fn print_status(status: &StatusFetch, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let port_w = status
        .statuses
        .iter()
        .map(|s| visible_width_ansi(&s.port))
        .max()
        .unwrap_or(0);
    for s in &status.statuses {
        let _ = writeln!(out, "{}  {}", pad_end_display(&s.port, port_w), s.response);
    }
    print_failures(&mut out, &status.failures, cfg);
}

pub fn print_detection(d: &InputDetection, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let row = |out: &mut dyn Write, port: &str, s: &InputState| {
        if s.connected {
            let _ = writeln!(
                out,
                "{port}  {}  {}",
                paint("connected", "32", cfg.color),
                s.signal.as_deref().unwrap_or("")
            );
        } else {
            let _ = writeln!(out, "{port}  {}", paint("no signal", "90", cfg.color));
        }
    };
    row(&mut out, "rx0", &d.rx0);
    row(&mut out, "rx1", &d.rx1);
    let _ = writeln!(out, "active input: {}", d.active_input.as_deref().unwrap_or("unknown"));
}

pub fn print_apply_plan(patch: &SettingsSnapshot, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "Dry run: these commands would be sent:");
    for (key, value) in patch.settings() {
        let _ = writeln!(out, "  set {key} {value}");
    }
}

pub fn print_apply(report: &ApplyReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    for r in &report.results {
        let mark = if r.applied {
            paint("ok", "32", cfg.color)
        } else {
            paint("fail", "31", cfg.color)
        };
        let _ = writeln!(out, "{}  set {} {}", pad_end_ansi(&mark, 4), r.key, r.value);
        if let Some(err) = &r.error {
            let _ = writeln!(out, "      {err}");
        }
    }
    let _ = writeln!(
        out,
        "Applied {}/{} settings.",
        report.applied_count(),
        report.results.len()
    );
}

pub fn print_analysis(analysis: &SnapshotAnalysis, artifact: Option<&str>, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let c = &analysis.issue_count;
    let _ = writeln!(
        out,
        "Summary: critical={} warning={} info={}",
        c.critical, c.warning, c.info
    );
    print_issues(&mut out, &analysis.issues, cfg);
    print_recommendations(&mut out, &analysis.recommendations, cfg);
    if let Some(path) = artifact {
        let _ = writeln!(out);
        let _ = writeln!(out, "Corrected config written to {path}");
    }
}

pub fn print_synthesis(s: &Synthesis, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let sum = &s.summary;
    let _ = writeln!(out, "Setup:");
    let _ = writeln!(out, "  display:  {}", sum.display);
    let _ = writeln!(out, "  matrix:   {}", sum.matrix);
    let _ = writeln!(out, "  receiver: {}", sum.receiver);
    let _ = writeln!(out, "  sources:  {}", sum.sources.join(", "));
    let _ = writeln!(out, "  speakers: {}", sum.speakers);
    let _ = writeln!(out, "  screen:   {}", sum.screen);
    let _ = writeln!(out, "  servers:  {}", sum.media_servers.join(", "));
    let _ = writeln!(out, "  goals:    {}", sum.goals.join(", "));

    print_recommendations(&mut out, &s.recommendations, cfg);

    if !s.settings_patch_detailed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Matrix settings:");
        let name_w = s
            .settings_patch_detailed
            .iter()
            .map(|d| visible_width_ansi(&d.name))
            .max()
            .unwrap_or(0);
        for d in &s.settings_patch_detailed {
            let _ = writeln!(
                out,
                "  {}  {}  ({})",
                pad_end_display(&d.name, name_w),
                d.display_value,
                d.menu_path
            );
        }
    }

    if !s.source_settings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Source settings:");
        for d in &s.source_settings {
            let _ = writeln!(out, "  {} = {}", d.setting, d.value);
            if let Some(path) = d.path.as_deref().filter(|p| !p.is_empty()) {
                let _ = writeln!(out, "    {path}");
            }
        }
    }

    print_suggestions(&mut out, "Receiver settings", &s.receiver_settings, cfg);
    print_suggestions(&mut out, "Display settings", &s.display_settings, cfg);

    if let Some(path) = &s.artifact {
        let _ = writeln!(out);
        let _ = writeln!(out, "Recommended settings written to {path}");
    }
}

fn print_suggestions(out: &mut dyn Write, heading: &str, items: &[ConfigSuggestion], cfg: &UiConfig) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{heading}:");
    for item in items {
        let _ = writeln!(out, "  [{}] {} = {}", item.category, item.setting, item.value);
        if !item.path.is_empty() {
            let _ = writeln!(out, "    {}", item.path);
        }
        if cfg.verbose {
            for (i, step) in item.steps.iter().enumerate() {
                let _ = writeln!(out, "    {}. {step}", i + 1);
            }
        }
    }
}

pub fn print_goals(cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let id_w = Goal::ALL.iter().map(|g| g.id().len()).max().unwrap_or(0);
    for goal in Goal::ALL {
        let _ = writeln!(out, "{}  {}", pad_end_display(goal.id(), id_w), goal.name());
        if cfg.verbose {
            let _ = writeln!(out, "{}  {}", " ".repeat(id_w), goal.description());
        }
    }
}

pub fn print_catalog(entries: &[CatalogEntry], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let id_w = entries.iter().map(|e| visible_width_ansi(&e.id)).max().unwrap_or(0);
    let mut current = None;
    for entry in entries {
        if current != Some(entry.category) {
            if current.is_some() {
                let _ = writeln!(out);
            }
            let _ = writeln!(out, "{}:", entry.category);
            current = Some(entry.category);
        }
        let _ = writeln!(out, "  {}  {}", pad_end_display(&entry.id, id_w), entry.name);
    }
}

pub fn print_backup(report: &BackupReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "Backed up {} settings and {} status readings from {}.",
        report.document.settings.len(),
        report.document.status_snapshot.len(),
        report.document.ip_address
    );
    match &report.artifact {
        Some(path) => {
            let _ = writeln!(out, "Backup written to {path}");
        }
        None => {
            let _ = writeln!(out, "Dry run: backup not written.");
        }
    }
    print_failures(&mut out, &report.failures, cfg);
}

fn paint(s: &str, code: &str, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn format_severity(severity: Severity, color: bool) -> String {
    let code = match severity {
        Severity::Critical => "31",
        Severity::Warning => "33",
        Severity::Info => "36",
    };
    paint(severity.as_str(), code, color)
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    pad_end_ansi(s, width)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
