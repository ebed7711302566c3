use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::channel::{DeviceLink, FailureReason, query_settings};
use crate::core::vocabulary::CHAIN_SETTINGS;
use crate::core::{
    ChainStage, Diagnosis, HdrFormat, HdrStatus, Issue, Recommendation, SettingValue,
    SettingsSnapshot, Severity, StageKind, Switch,
};
use crate::parser::{parse_signal_status, parse_sink_capabilities, parse_spd_status};

pub const DIAGNOSIS_SCHEMA_VERSION: &str = "1";

const INPUTS: [(&str, &str); 2] = [("rx0", "Input 0"), ("rx1", "Input 1")];
const METADATA: [(&str, &str); 2] = [("spd0", "SPD 0"), ("spd1", "SPD 1")];
const OUTPUTS: [(&str, &str); 2] = [("tx0", "Output 0"), ("tx1", "Output 1")];
const SINKS: [(&str, &str); 2] = [("tx0sink", "Sink 0"), ("tx1sink", "Sink 1")];

/// Walks the chain in the fixed order inputs, metadata, outputs, sinks, settings, then
/// runs the rule pass. Individual query failures become error stages; the walk never aborts.
pub fn run_chain<L: DeviceLink + ?Sized>(
    link: &mut L,
    device: &str,
    generated_at: OffsetDateTime,
) -> Diagnosis {
    let mut chain: Vec<ChainStage> = Vec::new();
    let mut hdr = HdrStatus::default();

    for (port, name) in INPUTS {
        let stage = probe_signal(link, port, name, StageKind::Input);
        if let Some(signal) = stage.signal.as_ref().filter(|s| s.hdr_format.is_hdr()) {
            hdr.input.detected = true;
            hdr.input.format = signal.hdr_format;
            hdr.input.details = Some(signal.clone());
        }
        chain.push(stage);
    }

    for (port, name) in METADATA {
        match link.get_status(port) {
            Err(err) => chain.push(ChainStage::failed(
                name.to_string(),
                StageKind::Metadata,
                port,
                FailureReason::transport(&err).to_string(),
            )),
            Ok(raw) if raw.is_empty() => {}
            Ok(raw) => {
                let spd = parse_spd_status(&raw, port);
                chain.push(ChainStage::metadata(name.to_string(), port, raw, spd));
            }
        }
    }

    for (port, name) in OUTPUTS {
        let stage = probe_signal(link, port, name, StageKind::Output);
        if let Some(signal) = stage.signal.as_ref().filter(|s| s.hdr_format.is_hdr()) {
            hdr.output.format = signal.hdr_format;
            hdr.output.details = Some(signal.clone());
        }
        chain.push(stage);
    }

    for (port, name) in SINKS {
        match link.get_status(port) {
            Err(err) => chain.push(ChainStage::failed(
                name.to_string(),
                StageKind::Sink,
                port,
                FailureReason::transport(&err).to_string(),
            )),
            Ok(raw) if raw.is_empty() => {}
            Ok(raw) => {
                let caps = parse_sink_capabilities(&raw);
                chain.push(ChainStage::sink(name.to_string(), port, raw, caps));
            }
        }
    }

    let (settings, _failures) = query_settings(link, &CHAIN_SETTINGS).into_snapshot();

    hdr.processing.lldv_active = hdr.input.format == HdrFormat::Lldv
        || settings.get("lldv").and_then(SettingValue::as_switch) == Some(Switch::On);
    hdr.processing.hdr_inject =
        settings.get("hdrcustom").and_then(SettingValue::as_switch) == Some(Switch::On);

    let (issues, recommendations) = chain_rules(&chain, &hdr, &settings);

    Diagnosis {
        schema_version: DIAGNOSIS_SCHEMA_VERSION.to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: generated_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| generated_at.unix_timestamp().to_string()),
        device: device.to_string(),
        signal_chain: chain,
        hdr_status: hdr,
        settings,
        issues,
        recommendations,
    }
}

fn probe_signal<L: DeviceLink + ?Sized>(
    link: &mut L,
    port: &str,
    name: &str,
    kind: StageKind,
) -> ChainStage {
    match link.get_status(port) {
        Err(err) => ChainStage::failed(
            name.to_string(),
            kind,
            port,
            FailureReason::transport(&err).to_string(),
        ),
        Ok(raw) if raw.is_empty() || raw.to_ascii_lowercase().contains("no signal") => {
            ChainStage::disconnected(name.to_string(), kind, port, raw)
        }
        Ok(raw) => ChainStage::connected(name.to_string(), kind, port, parse_signal_status(&raw)),
    }
}

/// Rule pass over a finished walk. Every applicable rule fires, in a fixed order.
pub fn chain_rules(
    chain: &[ChainStage],
    hdr: &HdrStatus,
    settings: &SettingsSnapshot,
) -> (Vec<Issue>, Vec<Recommendation>) {
    let mut issues = Vec::new();
    let mut recs = Vec::new();

    let input = hdr.input.format;
    if input.is_hdr() && hdr.output.format == HdrFormat::Sdr {
        issues.push(Issue::new(
            Severity::Critical,
            "HDR Lost in Signal Chain",
            format!(
                "Input signal is {input} but output is SDR. HDR is being stripped somewhere in the chain."
            ),
        ));

        if settings.normalized_or("edidhdrflag", "") == "off" {
            recs.push(
                Recommendation::critical(
                    "Enable HDR EDID Flag",
                    "The HDR flag is disabled in EDID. Enable it so sinks advertise HDR capability.",
                )
                .with_change("edidhdrflag", Switch::Off, Switch::On),
            );
        }
        if settings.normalized_or("hdrdisable", "") == "on" {
            recs.push(
                Recommendation::critical(
                    "Disable HDR Disable Setting",
                    "HDR is explicitly disabled. Turn this off to allow HDR passthrough.",
                )
                .with_change("hdrdisable", Switch::On, Switch::Off),
            );
        }
    }

    if input == HdrFormat::DolbyVision && settings.normalized_or("ediddvflag", "") != "on" {
        let current = settings
            .get("ediddvflag")
            .cloned()
            .unwrap_or_else(|| SettingValue::from("unknown"));
        recs.push(
            Recommendation::warning(
                "Enable Dolby Vision EDID Flag",
                "DV flag should be enabled for proper LLDV conversion.",
            )
            .with_change("ediddvflag", current, Switch::On),
        );
    }

    let edid_mode = settings.normalized_or("edidmode", "");
    if !matches!(edid_mode.as_str(), "automix" | "custom") {
        recs.push(
            Recommendation::warning(
                "Use AutoMix EDID Mode",
                "AutoMix is recommended for best compatibility with mixed HDR/SDR content.",
            )
            .with_change("edidmode", edid_mode.as_str(), "automix"),
        );
    }

    // An errored input is unknown, not absent.
    let no_input = chain
        .iter()
        .filter(|s| s.kind == StageKind::Input)
        .all(|s| !s.connected && !s.is_error());
    if no_input {
        issues.push(Issue::new(
            Severity::Warning,
            "No Input Signal Detected",
            "No active input signal detected. Check source connections.",
        ));
    }

    (issues, recs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedLink;
    use time::macros::datetime;

    const AT: OffsetDateTime = datetime!(2026-03-01 12:00:00 UTC);

    fn healthy_settings(link: ScriptedLink) -> ScriptedLink {
        link.setting("edidmode", "automix")
            .setting("ediddvflag", "on")
            .setting("edidhdrflag", "on")
            .setting("hdrdisable", "off")
    }

    #[test]
    fn all_inputs_without_signal_warn_exactly_once() {
        let mut link = healthy_settings(
            ScriptedLink::new()
                .status("rx0", "rx0 no signal")
                .status("rx1", "RX1 NO SIGNAL"),
        );
        let d = run_chain(&mut link, "10.0.0.9:2222", AT);

        let no_input: Vec<_> = d
            .issues
            .iter()
            .filter(|i| i.title == "No Input Signal Detected")
            .collect();
        assert_eq!(no_input.len(), 1);
        assert_eq!(no_input[0].severity, Severity::Warning);
        assert!(d.recommendations.is_empty());

        let names: Vec<_> = d.signal_chain.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(names, ["Input 0", "Input 1", "Output 0", "Output 1"]);
        assert!(d.signal_chain.iter().all(|s| !s.connected));
        assert_eq!(d.signal_chain[0].raw.as_deref(), Some("rx0 no signal"));
        assert_eq!(d.generated_at, "2026-03-01T12:00:00Z");
    }

    #[test]
    fn queries_follow_the_fixed_order() {
        let mut link = ScriptedLink::new();
        run_chain(&mut link, "box", AT);
        let expected: Vec<String> = [
            "get status rx0",
            "get status rx1",
            "get status spd0",
            "get status spd1",
            "get status tx0",
            "get status tx1",
            "get status tx0sink",
            "get status tx1sink",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(CHAIN_SETTINGS.iter().map(|k| format!("get {k}")))
        .collect();
        assert_eq!(link.sent, expected);
    }

    #[test]
    fn hdr_stripped_between_input_and_output() {
        let mut link = ScriptedLink::new()
            .status("rx0", "3840x2160p24 422 12b HDR10 BT2020")
            .status("rx1", "no signal")
            .status("spd0", "spd0 NVIDIA SHIELD HDR")
            .status("tx0", "3840x2160p24 422 8b SDR BT709")
            .status("tx0sink", "3840x2160p60 HDR HLG")
            .setting("edidmode", "automix")
            .setting("edidhdrflag", "off")
            .setting("hdrdisable", "on");
        let d = run_chain(&mut link, "box", AT);

        assert_eq!(d.issues.len(), 1);
        assert_eq!(d.issues[0].title, "HDR Lost in Signal Chain");
        assert_eq!(
            d.issues[0].description,
            "Input signal is HDR10 but output is SDR. HDR is being stripped somewhere in the chain."
        );

        let titles: Vec<_> = d.recommendations.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Enable HDR EDID Flag", "Disable HDR Disable Setting"]);
        assert!(d.recommendations.iter().all(|r| r.severity == Severity::Critical));
        assert_eq!(d.recommendations[0].command.as_deref(), Some("set edidhdrflag on"));
        assert_eq!(
            d.recommendations[1].menu_path.as_deref(),
            Some("Vrroom Web UI > SIGNAL > HDR DISABLE")
        );

        assert!(d.hdr_status.input.detected);
        assert_eq!(d.hdr_status.input.format, HdrFormat::Hdr10);
        assert_eq!(d.hdr_status.output.format, HdrFormat::Sdr);
        assert!(d.hdr_status.output.details.is_none());

        let spd = d.stages(StageKind::Metadata).next().expect("spd stage");
        assert_eq!(spd.stage, "SPD 0");
        let sink = d.stages(StageKind::Sink).next().expect("sink stage");
        assert!(sink.sink.as_ref().is_some_and(|c| c.hdr_capable));
    }

    #[test]
    fn dolby_vision_input_without_dv_flag() {
        let mut link = ScriptedLink::new()
            .status("rx0", "3840x2160p24 DV")
            .status("tx0", "3840x2160p24 DV")
            .setting("edidmode", "fixed");
        let d = run_chain(&mut link, "box", AT);

        assert!(d.issues.is_empty());
        let titles: Vec<_> = d.recommendations.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Enable Dolby Vision EDID Flag", "Use AutoMix EDID Mode"]);
        assert_eq!(
            d.recommendations[0].current_value,
            Some(SettingValue::from("unknown"))
        );
        assert_eq!(d.recommendations[1].current_value, Some(SettingValue::from("fixed")));
        assert!(d.recommendations.iter().all(|r| r.severity == Severity::Warning));
    }

    #[test]
    fn failed_queries_become_error_stages_and_the_walk_continues() {
        let mut link = healthy_settings(
            ScriptedLink::new()
                .status("rx0", "no signal")
                .fail("get status rx1")
                .fail("get status spd0")
                .status("tx0", "1920x1080p60 RGB 8b"),
        );
        let d = run_chain(&mut link, "box", AT);

        let rx1 = &d.signal_chain[1];
        assert_eq!(rx1.stage, "Input 1");
        assert!(rx1.is_error());
        assert!(!rx1.connected);
        assert!(rx1.error.as_deref().is_some_and(|e| e.contains("connection reset")));

        assert!(d.stages(StageKind::Metadata).all(ChainStage::is_error));
        assert!(d.stages(StageKind::Output).next().is_some_and(|s| s.connected));
        assert!(
            d.issues.iter().all(|i| i.title != "No Input Signal Detected"),
            "an errored input must not count as disconnected"
        );
        assert_eq!(d.settings.len(), 4);
    }

    #[test]
    fn processing_summary_reflects_lldv_and_injection() {
        let mut link = healthy_settings(
            ScriptedLink::new()
                .status("rx0", "3840x2160p24 LLDV")
                .status("tx0", "3840x2160p24 LLDV")
                .setting("hdrcustom", "on"),
        );
        let d = run_chain(&mut link, "box", AT);
        assert_eq!(d.hdr_status.input.format, HdrFormat::Lldv);
        assert!(d.hdr_status.processing.lldv_active);
        assert!(d.hdr_status.processing.hdr_inject);

        let mut link = healthy_settings(ScriptedLink::new().setting("lldv", "on"));
        let d = run_chain(&mut link, "box", AT);
        assert!(d.hdr_status.processing.lldv_active);
        assert!(!d.hdr_status.processing.hdr_inject);
        assert!(!d.hdr_status.input.detected);
    }
}
