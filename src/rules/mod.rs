use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{
    Issue, Recommendation, SettingValue, SettingsSnapshot, Severity, SeverityCount,
};

pub const OPTIMIZED_BY: &str = "avlab";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotAnalysis {
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    pub issue_count: SeverityCount,
    pub corrected: SettingsSnapshot,
}

#[derive(Debug, Default)]
struct RuleOutput {
    issues: Vec<Issue>,
    notes: Vec<Recommendation>,
}

pub fn analyze_snapshot(snapshot: &SettingsSnapshot) -> SnapshotAnalysis {
    analyze_snapshot_at(snapshot, OffsetDateTime::now_utc())
}

/// Evaluates `snapshot` against the fixed rule set. The input is left untouched.
pub fn analyze_snapshot_at(snapshot: &SettingsSnapshot, now: OffsetDateTime) -> SnapshotAnalysis {
    let mut out = RuleOutput::default();
    edid_mode(snapshot, &mut out);
    unmute_delays(snapshot, &mut out);
    dolby_vision(snapshot, &mut out);
    hdr(snapshot, &mut out);
    hdcp(snapshot, &mut out);
    cec(snapshot, &mut out);
    audio_routing(snapshot, &mut out);

    let issue_count = SeverityCount::tally(out.issues.iter().map(|i| &i.severity));
    let corrected = correct(snapshot, &out.issues, now);
    SnapshotAnalysis {
        issues: out.issues,
        recommendations: out.notes,
        issue_count,
        corrected,
    }
}

/// Clone of `snapshot` with every critical/warning fix applied, stamped with bookkeeping keys.
pub fn correct(snapshot: &SettingsSnapshot, issues: &[Issue], now: OffsetDateTime) -> SettingsSnapshot {
    let mut corrected = snapshot.clone();
    for (key, value) in issues.iter().filter_map(Issue::correction) {
        corrected.insert(key, value.clone());
    }
    corrected.insert("_optimized", true);
    stamp(&mut corrected, now);
    corrected
}

/// Adds `_optimized_date` and `_optimized_by`.
pub fn stamp(settings: &mut SettingsSnapshot, now: OffsetDateTime) {
    let date = now
        .to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    settings.insert("_optimized_date", SettingValue::Text(date));
    settings.insert("_optimized_by", OPTIMIZED_BY);
}

fn edid_mode(s: &SettingsSnapshot, out: &mut RuleOutput) {
    let mode = s.normalized_or("edidmode", "");
    if mode == "fixed" {
        out.issues.push(
            Issue::new(
                Severity::Warning,
                "Fixed EDID Mode",
                "Fixed EDID mode limits sink capabilities. Consider AutoMix for better compatibility.",
            )
            .on_setting("edidmode", mode.as_str(), "automix"),
        );
    } else if !mode.is_empty() && !matches!(mode.as_str(), "automix" | "custom" | "copytx0" | "copytx1") {
        out.issues.push(
            Issue::new(
                Severity::Info,
                "Unknown EDID Mode",
                format!("EDID mode '{mode}' not recognized. AutoMix recommended for most setups."),
            )
            .on_setting("edidmode", mode.as_str(), "automix"),
        );
    }

    if mode == "automix" {
        out.notes.push(Recommendation::info(
            "EDID Mode Optimal",
            "AutoMix mode allows dynamic EDID modification for LLDV injection.",
        ));
    }
}

fn integer_or_zero(s: &SettingsSnapshot, key: &str) -> i64 {
    s.get(key).and_then(SettingValue::as_integer).unwrap_or(0)
}

fn unmute_delays(s: &SettingsSnapshot, out: &mut RuleOutput) {
    let delay = integer_or_zero(s, "unmutedelay");
    if delay > 500 {
        out.issues.push(
            Issue::new(
                Severity::Critical,
                "High Unmute Delay",
                format!(
                    "Unmute delay of {delay}ms adds significant latency. Try reducing to 200-300ms if no audio pops occur."
                ),
            )
            .on_setting("unmutedelay", delay, 250),
        );
    } else if delay == 0 {
        out.issues.push(
            Issue::new(
                Severity::Info,
                "No Unmute Delay",
                "Zero unmute delay may cause audio pops on some systems. Add 100-200ms if you hear clicks/pops on format changes.",
            )
            .on_setting("unmutedelay", 0, 150),
        );
    }

    let earc = integer_or_zero(s, "earcunmute");
    if earc > 500 {
        out.issues.push(
            Issue::new(
                Severity::Warning,
                "High eARC Unmute Delay",
                format!("eARC unmute delay of {earc}ms may cause noticeable audio lag."),
            )
            .on_setting("earcunmute", earc, 300),
        );
    }
}

fn dolby_vision(s: &SettingsSnapshot, out: &mut RuleOutput) {
    match s.normalized_or("ediddvflag", "off").as_str() {
        "off" => out.issues.push(
            Issue::new(
                Severity::Info,
                "Dolby Vision Disabled",
                "DV EDID flag is off. Enable for LLDV support on non-DV displays.",
            )
            .on_setting("ediddvflag", "off", "on"),
        ),
        "on" => out.notes.push(Recommendation::info(
            "DV Enabled",
            "Ensure LLDV-compatible DV string is selected (X930E or similar) for non-DV projectors.",
        )),
        _ => {}
    }
}

fn hdr(s: &SettingsSnapshot, out: &mut RuleOutput) {
    if s.normalized_or("edidhdrflag", "on") == "off" {
        out.issues.push(
            Issue::new(
                Severity::Warning,
                "HDR Disabled in EDID",
                "HDR flag is disabled. Sources won't output HDR content.",
            )
            .on_setting("edidhdrflag", "off", "on"),
        );
    }
    if s.normalized_or("hdrcustom", "off") == "on" {
        out.notes.push(Recommendation::info(
            "Custom HDR Injection Active",
            "Note: Custom HDR injection automatically disables under VRR signals.",
        ));
    }
}

// Exported documents use `hdcpmode`; a live read only has `hdcp`.
fn hdcp(s: &SettingsSnapshot, out: &mut RuleOutput) {
    let mode = s
        .get("hdcpmode")
        .or_else(|| s.get("hdcp"))
        .map(SettingValue::normalized)
        .unwrap_or_else(|| "auto".to_string());
    if mode != "auto" {
        out.issues.push(
            Issue::new(
                Severity::Info,
                "Manual HDCP Mode",
                format!("HDCP is set to '{mode}'. Auto mode is recommended unless troubleshooting."),
            )
            .on_setting("hdcpmode", mode.as_str(), "auto"),
        );
    }
}

fn cec(s: &SettingsSnapshot, out: &mut RuleOutput) {
    if s.get("cecenabled").is_some_and(SettingValue::is_truthy) {
        out.notes.push(Recommendation::info(
            "CEC Enabled",
            "CEC can add latency on input switches. Disable if not using TV/AVR power control features.",
        ));
    }
}

fn audio_routing(s: &SettingsSnapshot, out: &mut RuleOutput) {
    let audio_out = s.normalized_or("audioout", "");
    let earc_mode = s.normalized_or("earcmode", "");
    if audio_out == "earc" || matches!(earc_mode.as_str(), "auto earc" | "earc") {
        out.notes.push(Recommendation::info(
            "eARC Audio Routing",
            "eARC provides best audio quality. Ensure eARC device is powered on before source.",
        ));
    }
}
