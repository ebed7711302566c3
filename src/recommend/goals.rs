use crate::core::{Goal, Recommendation, SourceProfile};

use super::{DeviceSetting, GoalOutput, ResolvedEquipment};

pub type GoalHandler = fn(&ResolvedEquipment<'_>) -> GoalOutput;

pub fn handler(goal: Goal) -> GoalHandler {
    match goal {
        Goal::AvoidBonk => avoid_bonk,
        Goal::LldvNonDv => lldv_non_dv,
        Goal::BestAudio => best_audio,
        Goal::GamingLowLatency => gaming_low_latency,
        Goal::FixPreroll => fix_preroll,
        Goal::HdrPassthrough => hdr_passthrough,
        Goal::MinimizeFormatSwitch => minimize_format_switch,
    }
}

fn suggestion(source: &SourceProfile, setting: String, value: &str, reason: &str, kind: &str) -> DeviceSetting {
    DeviceSetting {
        setting,
        value: value.to_string(),
        device: source.name.clone(),
        reason: reason.to_string(),
        path: Some(source.settings_path(kind).unwrap_or_default()),
    }
}

fn avoid_bonk(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();
    out.recommendations.push(Recommendation::critical(
        "Match Pre-roll Format to Library Content",
        "The primary cause of bonk is format mismatch between pre-roll and main content. \
         Encode your pre-roll at the same resolution, frame rate, HDR format, and codec as \
         your most common library content (typically 4K HEVC HDR10 23.976fps).",
    ));
    out.patch.insert("edidmode", "automix");

    let unmute: i64 = match eq.receiver {
        Some(r) if r.handshake_time_ms > 500 => 250,
        _ => 200,
    };
    out.patch.insert("unmutedelay", unmute);
    out.recommendations.push(Recommendation::warning(
        format!("Set Unmute Delay to {unmute}ms"),
        format!(
            "Balance between audio pop prevention and responsiveness. \
             Start at {unmute}ms and reduce if no audio pops occur."
        ),
    ));

    if eq.display.is_some_and(|d| d.has_slow_handshake()) {
        out.recommendations.push(Recommendation::warning(
            "Consider Fixed Output Resolution",
            "Your display has a slow handshake. Consider setting your source to always \
             output 4K to avoid resolution-change-triggered handshakes. Only frame rate \
             and HDR mode should change.",
        ));
        for (_, source) in &eq.sources {
            out.source_settings.push(suggestion(
                source,
                format!("Output Resolution ({})", source.name),
                "4K (fixed)",
                "Prevents resolution-change handshake delays on slow displays.",
                "resolution",
            ));
        }
    }

    if let Some((_, server)) = eq.primary_media_server() {
        out.recommendations.push(Recommendation::info(
            format!("Pre-roll Format for {}", server.name),
            "Encode pre-roll as 4K HEVC HDR10 23.976fps to match typical movie content. \
             This prevents the format switch that causes bonk between pre-roll and feature.",
        ));
    }
    out
}

fn lldv_non_dv(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();

    if let Some(display) = eq.display.filter(|d| d.native_dv) {
        out.recommendations.push(Recommendation::info(
            "Display Has Native Dolby Vision",
            format!(
                "{} already supports DV natively. \
                 LLDV conversion is not required, but Vrroom can still pass DV through.",
                display.name
            ),
        ));
        out.patch.insert("ediddvflag", "on");
        return out;
    }

    if let Some(matrix) = eq.matrix.filter(|m| !m.lldv_support) {
        out.recommendations.push(Recommendation::critical(
            "HDFury Device Does Not Support LLDV",
            format!(
                "{} does not support LLDV injection. \
                 Consider upgrading to Vrroom or Diva for LLDV capability.",
                matrix.name
            ),
        ));
        return out;
    }

    out.patch.insert("edidmode", "automix");
    out.patch.insert("ediddvflag", "on");
    out.patch.insert("ediddvmode", 1);
    out.patch.insert("edidhdrflag", "on");
    out.patch.insert("edidhdrmode", 1);

    let display_name = eq.display.map_or("your display", |d| d.name.as_str());
    out.recommendations.push(Recommendation::critical(
        "Enable LLDV in AutoMix Mode",
        format!(
            "Set EDID to AutoMix with DV flag enabled and LLDV-compatible string (X930E). \
             This tells sources to output LLDV, which Vrroom converts to HDR10 for {display_name}."
        ),
    ));
    out.recommendations.push(Recommendation::warning(
        "Select LLDV DV String",
        "On the Vrroom EDID page, under AutoMix > DV dropdown, select 'X930E LLDV' string. \
         This is the recommended LLDV string for non-DV projectors.",
    ));
    out.recommendations.push(Recommendation::info(
        "LLDV Under VRR Signals",
        "LLDV>HDR injection is supported under VRR signals since firmware 0.51, \
         though some Samsung TVs may have issues.",
    ));

    match eq.primary_source() {
        Some((_, source)) if source.lldv_output => {
            out.recommendations.push(Recommendation::info(
                format!("{} Supports LLDV Output", source.name),
                "This source can output LLDV natively. Once EDID is configured, \
                 it will automatically output LLDV when DV content is played.",
            ));
        }
        Some((_, source)) if !source.dv_output => {
            out.recommendations.push(Recommendation::warning(
                "Source Has No DV Output",
                format!(
                    "{} does not support Dolby Vision output. Content will fall back to HDR10.",
                    source.name
                ),
            ));
        }
        _ => {}
    }
    out
}

fn best_audio(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();
    let receiver_earc = eq.receiver.is_some_and(|r| r.earc_support);
    let matrix_earc = eq.matrix.is_some_and(|m| m.earc_support);
    let soundbar = eq.speakers.is_some_and(|(id, _)| id.contains("soundbar"));

    if receiver_earc && matrix_earc {
        out.patch.insert("earcmode", "auto earc");
        out.recommendations.push(Recommendation::critical(
            "Use eARC for Audio Routing",
            "Both your AVR and HDFury device support eARC. Set eARC mode to 'Auto eARC' \
             for lossless Atmos/DTS:X passthrough. Ensure eARC device powers on before source.",
        ));
    } else if soundbar && matrix_earc {
        out.patch.insert("earcmode", "auto earc");
        out.recommendations.push(Recommendation::warning(
            "eARC for Soundbar",
            "Set eARC mode for soundbar connection. If using ARC-only soundbar, \
             switch to 'Auto ARC' mode instead.",
        ));
    }

    if let Some((_, speakers)) = eq.speakers.filter(|(_, s)| s.atmos_capable) {
        for (_, source) in &eq.sources {
            out.source_settings.push(suggestion(
                source,
                format!("Audio Output ({})", source.name),
                "Bitstream (passthrough)",
                "Bitstream passes lossless Atmos/DTS:X to AVR for decoding.",
                "audio",
            ));
        }
        out.recommendations.push(Recommendation::info(
            "Atmos Speaker Layout Detected",
            format!(
                "Your {} setup supports Atmos. \
                 Ensure all sources are set to bitstream output for lossless audio passthrough.",
                speakers.name
            ),
        ));
    }

    if receiver_earc {
        out.patch.insert("earcunmute", 200);
        out.recommendations.push(Recommendation::info(
            "eARC Unmute Delay: 200ms",
            "A small eARC unmute delay prevents audio pops when switching formats. \
             Reduce to 100ms if no pops occur, increase to 300ms if they persist.",
        ));
    }
    out
}

fn gaming_low_latency(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();
    let display_vrr = eq.display.is_some_and(|d| d.vrr_support);
    let display_allm = eq.display.is_some_and(|d| d.allm_support);
    let matrix_vrr = eq.matrix.is_some_and(|m| m.vrr_support);
    let matrix_allm = eq.matrix.is_some_and(|m| m.allm_support);

    if let Some(display) = eq.display {
        if !display_vrr {
            out.recommendations.push(Recommendation::warning(
                format!("{} Does Not Support VRR", display.name),
                "Your display does not support Variable Refresh Rate (VRR). \
                 Gaming will work at fixed refresh rates. VRR passthrough in \
                 the Vrroom will have no effect for this display.",
            ));
        }
        if !display_allm {
            out.recommendations.push(Recommendation::info(
                format!("{} Does Not Support ALLM", display.name),
                "Auto Low Latency Mode is not supported by your display. \
                 You may need to manually switch to game/fast mode on your display when gaming.",
            ));
        }
    }

    if matrix_vrr && display_vrr {
        out.recommendations.push(Recommendation::critical(
            "Enable VRR Passthrough",
            "Both your HDFury device and display support VRR. Enable VRR passthrough \
             for tear-free gaming.",
        ));
        out.patch.insert("edidvrrflag", "on");
    } else if matrix_vrr {
        out.recommendations.push(Recommendation::info(
            "VRR Passthrough Available but Display Incompatible",
            "Your Vrroom supports VRR passthrough but your display does not accept VRR. \
             VRR flag will not be added to EDID.",
        ));
    }

    if matrix_allm && display_allm {
        out.patch.insert("edidallmflag", "on");
        out.recommendations.push(Recommendation::info(
            "ALLM Passthrough Enabled",
            "ALLM will automatically switch your display to game mode when gaming content is detected.",
        ));
    } else if matrix_allm {
        out.recommendations.push(Recommendation::info(
            "ALLM Passthrough Available but Display Incompatible",
            "Your Vrroom supports ALLM passthrough but your display does not support it. \
             Manually switch your display to game/fast mode when gaming.",
        ));
    }

    out.patch.insert("hdrcustom", "off");
    out.recommendations.push(Recommendation::warning(
        "Disable Custom HDR Injection for Gaming",
        "Custom HDR injection adds processing overhead. It automatically disables under VRR \
         signals, but explicitly disabling it avoids edge cases.",
    ));

    for (_, source) in eq.sources.iter().filter(|(_, s)| s.max_refresh >= 120) {
        out.source_settings.push(suggestion(
            source,
            format!("Output Resolution ({})", source.name),
            "4K 120Hz",
            "Maximum refresh rate for smoothest gaming.",
            "resolution",
        ));
    }

    out.patch.insert("unmutedelay", 100);
    out.recommendations.push(Recommendation::info(
        "Minimize Unmute Delay for Gaming",
        "Set unmute delay to 100ms or lower to minimize audio latency during gaming.",
    ));
    out
}

fn fix_preroll(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();
    out.recommendations.push(Recommendation::critical(
        "Pre-roll Format Must Match Main Content",
        "The most common cause of seeing only 1 frame with audio is the display performing an \
         HDMI handshake when switching from pre-roll format to content format. During this \
         handshake (2-3 seconds), the display shows nothing while audio continues from the AVR. \
         Solution: re-encode pre-roll to match your library's dominant format.",
    ));
    out.recommendations.push(Recommendation::critical(
        "Recommended Pre-roll Encoding",
        "Encode pre-roll as: 3840x2160 (4K), HEVC codec, HDR10 (BT.2020, SMPTE ST 2084), \
         23.976fps, 10-bit. This matches the most common 4K movie format and avoids handshake.",
    ));
    out.recommendations.push(Recommendation::warning(
        "Use the Pre-roll Analyzer Tab",
        "Upload your current pre-roll video in the Pre-roll Analyzer tab to get specific \
         FFmpeg commands for re-encoding it to the optimal format.",
    ));
    out.patch.insert("edidmode", "automix");

    if let Some((id, server)) = eq.primary_media_server() {
        if id == "emby" {
            out.recommendations.push(Recommendation::info(
                "Emby Pre-roll Known Issue",
                "Emby cinema intros are known to show only 1 frame when there's a format \
                 mismatch. Re-encoding the pre-roll to match content format resolves this.",
            ));
        }
        out.recommendations.push(Recommendation::info(
            format!("Test with Multiple {} Clients", server.name),
            "Test pre-roll playback with different clients (web, mobile, TV app) to confirm \
             the issue is HDMI handshake related and not client-specific.",
        ));
    }
    out
}

fn hdr_passthrough(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();
    out.patch.insert("edidhdrflag", "on");
    out.patch.insert("edidhdrmode", 1);
    out.patch.insert("edidmode", "automix");
    out.patch.insert("hdcpmode", "auto");

    out.recommendations.push(Recommendation::critical(
        "Enable HDR in EDID",
        "HDR flag must be enabled in EDID for sources to output HDR content. \
         Set HDR mode to HDR10/HLG for broadest compatibility.",
    ));

    if let Some(display) = eq.display.filter(|d| !d.hdr_support.is_empty()) {
        let list = display.hdr_support.join(", ");
        out.recommendations.push(Recommendation::info(
            format!("Display HDR Support: {list}"),
            format!(
                "{} supports {list}. EDID HDR mode has been set to match.",
                display.name
            ),
        ));
        if display.hdr_support.iter().any(|f| f == "HDR10+") {
            out.patch.insert("edidhdrmode", 2);
        }
    }

    out.recommendations.push(Recommendation::info(
        "HDCP Set to Auto",
        "HDCP auto mode ensures proper handshake without forcing a version. \
         Manual HDCP settings can cause 4K HDR content to fail.",
    ));
    out
}

fn minimize_format_switch(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();
    out.recommendations.push(Recommendation::critical(
        "Set Source to Fixed Output Format",
        "Configure your source device to output a fixed resolution (4K) and let the \
         Vrroom handle any necessary conversion. Only allow frame rate matching to change.",
    ));

    if let Some((id, source)) = eq.primary_source() {
        let manual = |setting: &str, value: &str, reason: &str| DeviceSetting {
            setting: setting.to_string(),
            value: value.to_string(),
            device: source.name.clone(),
            reason: reason.to_string(),
            path: None,
        };
        if source.match_frame_rate {
            out.source_settings.push(manual(
                "Match Frame Rate",
                "Enabled",
                "Frame rate changes cause minimal handshake delay compared to resolution changes.",
            ));
        }
        out.source_settings.push(manual(
            "Output Resolution",
            "4K (always)",
            "Fixed 4K output prevents resolution-triggered handshakes.",
        ));
        if id == "apple_tv_4k" {
            out.source_settings.push(manual(
                "Video Format",
                "4K SDR 60Hz",
                "Apple TV with Match Content enabled: set base to 4K SDR, let match content handle HDR/fps.",
            ));
        }
    }

    out.patch.insert("edidmode", "automix");
    out.recommendations.push(Recommendation::info(
        "AutoMix Prevents EDID Re-reads",
        "AutoMix mode provides a stable EDID to sources, preventing them from \
         re-reading EDID and triggering unnecessary handshakes.",
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::core::{EquipmentSelection, SettingValue, Severity};

    fn run(goal: Goal, selection: EquipmentSelection) -> GoalOutput {
        let catalog = InMemoryCatalog::builtin().expect("builtin");
        let eq = ResolvedEquipment::resolve(&catalog, &selection);
        handler(goal)(&eq)
    }

    fn titles(out: &GoalOutput) -> Vec<&str> {
        out.recommendations.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn every_goal_has_a_handler() {
        let selection = EquipmentSelection {
            display: Some("epson_eh_ls12000b".into()),
            matrix: Some("vrroom".into()),
            receiver: Some("yamaha_rx_a4a".into()),
            sources: vec!["apple_tv_4k".into()],
            speakers: Some("atmos_7_2_4".into()),
            ..Default::default()
        };
        for goal in Goal::ALL {
            let out = run(goal, selection.clone());
            assert!(!out.recommendations.is_empty(), "{goal}");
        }
    }

    #[test]
    fn audio_goal_needs_audio_equipment() {
        let out = run(Goal::BestAudio, EquipmentSelection::default());
        assert!(out.recommendations.is_empty());
        assert!(out.patch.is_empty());
        assert!(!run(Goal::FixPreroll, EquipmentSelection::default()).recommendations.is_empty());
    }

    #[test]
    fn bonk_on_slow_projector_with_slow_receiver() {
        let out = run(
            Goal::AvoidBonk,
            EquipmentSelection {
                display: Some("epson_eh_ls12000b".into()),
                receiver: Some("denon_avr_x3800h".into()),
                sources: vec!["nvidia_shield_pro".into(), "ps5".into()],
                media_servers: vec!["plex".into()],
                ..Default::default()
            },
        );
        assert_eq!(
            titles(&out),
            vec![
                "Match Pre-roll Format to Library Content",
                "Set Unmute Delay to 250ms",
                "Consider Fixed Output Resolution",
                "Pre-roll Format for Plex",
            ]
        );
        assert_eq!(out.patch.get("unmutedelay"), Some(&SettingValue::Integer(250)));
        assert_eq!(out.source_settings.len(), 2);
        assert_eq!(out.source_settings[1].setting, "Output Resolution (PlayStation 5)");
        assert!(out.source_settings[0].path.as_deref().is_some_and(|p| p.contains("Resolution")));
    }

    #[test]
    fn lldv_short_circuits() {
        let native = run(
            Goal::LldvNonDv,
            EquipmentSelection {
                display: Some("lg_c3_oled".into()),
                matrix: Some("arcana".into()),
                ..Default::default()
            },
        );
        assert_eq!(titles(&native), vec!["Display Has Native Dolby Vision"]);
        assert_eq!(native.patch.len(), 1);

        let no_lldv = run(
            Goal::LldvNonDv,
            EquipmentSelection {
                display: Some("epson_eh_ls12000b".into()),
                matrix: Some("arcana".into()),
                ..Default::default()
            },
        );
        assert_eq!(titles(&no_lldv), vec!["HDFury Device Does Not Support LLDV"]);
        assert_eq!(no_lldv.recommendations[0].severity, Severity::Critical);
        assert!(no_lldv.patch.is_empty());
    }

    #[test]
    fn lldv_full_path_patches_edid() {
        let out = run(
            Goal::LldvNonDv,
            EquipmentSelection {
                display: Some("epson_eh_ls12000b".into()),
                matrix: Some("vrroom".into()),
                sources: vec!["xbox_series_x".into()],
                ..Default::default()
            },
        );
        assert_eq!(out.patch.len(), 5);
        assert_eq!(out.patch.get("ediddvmode"), Some(&SettingValue::Integer(1)));
        assert_eq!(out.patch.get("edidmode"), Some(&SettingValue::from("automix")));
        assert!(out.recommendations[0].description.contains("Epson EH-LS12000b"));
    }

    #[test]
    fn soundbar_gets_earc_without_receiver() {
        let out = run(
            Goal::BestAudio,
            EquipmentSelection {
                matrix: Some("vrroom".into()),
                speakers: Some("soundbar_atmos".into()),
                sources: vec!["apple_tv_4k".into()],
                ..Default::default()
            },
        );
        assert_eq!(
            titles(&out),
            vec!["eARC for Soundbar", "Atmos Speaker Layout Detected"]
        );
        assert_eq!(out.patch.get("earcmode"), Some(&SettingValue::from("auto earc")));
        assert!(!out.patch.contains_key("earcunmute"));
        assert_eq!(out.source_settings.len(), 1);
    }

    #[test]
    fn gaming_on_vrr_display() {
        let out = run(
            Goal::GamingLowLatency,
            EquipmentSelection {
                display: Some("lg_c3_oled".into()),
                matrix: Some("vrroom".into()),
                sources: vec!["xbox_series_x".into(), "apple_tv_4k".into()],
                ..Default::default()
            },
        );
        let t = titles(&out);
        assert!(t.contains(&"Enable VRR Passthrough"));
        assert!(t.contains(&"ALLM Passthrough Enabled"));
        assert!(!t.iter().any(|t| t.contains("Does Not Support")));
        assert_eq!(out.patch.get("edidvrrflag"), Some(&SettingValue::from("on")));
        assert_eq!(out.patch.get("hdrcustom"), Some(&SettingValue::from("off")));
        assert_eq!(out.source_settings.len(), 1);
        assert_eq!(out.source_settings[0].value, "4K 120Hz");
    }

    #[test]
    fn gaming_on_projector_without_vrr() {
        let out = run(
            Goal::GamingLowLatency,
            EquipmentSelection {
                display: Some("epson_eh_ls12000b".into()),
                matrix: Some("vrroom".into()),
                ..Default::default()
            },
        );
        let t = titles(&out);
        assert_eq!(t[0], "Epson EH-LS12000b Does Not Support VRR");
        assert!(t.contains(&"VRR Passthrough Available but Display Incompatible"));
        assert!(t.contains(&"ALLM Passthrough Available but Display Incompatible"));
        assert!(!out.patch.contains_key("edidvrrflag"));
    }

    #[test]
    fn emby_preroll_note() {
        let out = run(
            Goal::FixPreroll,
            EquipmentSelection {
                media_servers: vec!["emby".into(), "plex".into()],
                ..Default::default()
            },
        );
        let t = titles(&out);
        assert!(t.contains(&"Emby Pre-roll Known Issue"));
        assert_eq!(t.last(), Some(&"Test with Multiple Emby Clients"));
    }

    #[test]
    fn hdr10_plus_display_raises_hdr_mode() {
        let out = run(
            Goal::HdrPassthrough,
            EquipmentSelection {
                display: Some("samsung_qn90c".into()),
                ..Default::default()
            },
        );
        assert_eq!(out.patch.get("edidhdrmode"), Some(&SettingValue::Integer(2)));
        assert!(titles(&out).iter().any(|t| t.starts_with("Display HDR Support: ")));
    }

    #[test]
    fn apple_tv_gets_video_format() {
        let out = run(
            Goal::MinimizeFormatSwitch,
            EquipmentSelection {
                sources: vec!["apple_tv_4k".into(), "ps5".into()],
                ..Default::default()
            },
        );
        let settings: Vec<_> = out.source_settings.iter().map(|s| s.setting.as_str()).collect();
        assert_eq!(settings, vec!["Match Frame Rate", "Output Resolution", "Video Format"]);
        assert!(out.source_settings.iter().all(|s| s.path.is_none()));
    }
}
