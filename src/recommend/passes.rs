use crate::core::{DisplayProfile, Recommendation, ScreenProfile};

use super::{ConfigSuggestion, DeviceSetting, GoalOutput, ResolvedEquipment};

/// Always-on rules that depend only on the selected equipment.
pub(super) fn baseline(eq: &ResolvedEquipment<'_>) -> GoalOutput {
    let mut out = GoalOutput::default();
    out.patch.insert("hdcpmode", "auto");

    if let Some(display) = eq.display.filter(|d| d.has_slow_handshake()) {
        out.recommendations.push(Recommendation::info(
            format!("{} Has Slow Handshake", display.name),
            format!(
                "This display has a typical handshake time of {}ms. \
                 Minimizing format changes is especially important for this device.",
                display.handshake_time_ms
            ),
        ));
    }

    if let Some(receiver) = eq.receiver.filter(|r| r.earc_support) {
        out.recommendations.push(Recommendation::info(
            "eARC Recommended for Audio",
            format!(
                "{} supports eARC. Use eARC routing for lossless Atmos/DTS:X passthrough.",
                receiver.name
            ),
        ));
    }

    for (_, source) in &eq.sources {
        if source.match_frame_rate {
            out.source_settings.push(DeviceSetting {
                setting: format!("Match Frame Rate ({})", source.name),
                value: "Enabled".to_string(),
                device: source.name.clone(),
                reason: "Prevents unnecessary refresh rate changes.".to_string(),
                path: Some(source.settings_path("frame_rate").unwrap_or_default()),
            });
        }
        if source.match_resolution {
            out.source_settings.push(DeviceSetting {
                setting: format!("Match Resolution ({})", source.name),
                value: "Enabled".to_string(),
                device: source.name.clone(),
                reason: "Outputs content at native resolution.".to_string(),
                path: Some(source.settings_path("resolution").unwrap_or_default()),
            });
        }
    }
    out
}

/// Receiver menu settings for the selected speaker layout.
pub(super) fn receiver(eq: &ResolvedEquipment<'_>) -> (Vec<Recommendation>, Vec<ConfigSuggestion>) {
    let mut recs = Vec::new();
    let mut settings = Vec::new();
    let (Some(receiver), Some((_, speakers))) = (eq.receiver, eq.speakers) else {
        return (recs, settings);
    };
    let paths = &receiver.config_paths;
    let ch = speakers.channels;
    let subs = speakers.sub_channels;
    let overhead = speakers.overhead_channels;

    let label = if overhead > 0 {
        format!("{ch}.{subs}.{overhead}")
    } else if !speakers.layout.is_empty() {
        speakers.layout.clone()
    } else {
        format!("{ch}.{subs}")
    };

    settings.push(
        ConfigSuggestion::new(
            "Speaker Configuration",
            format!("{label} ({} total speakers)", ch + overhead + subs),
            "speakers",
            format!("Set AVR to {label} layout to match your physical speaker arrangement."),
        )
        .at(paths.get("speaker_setup")),
    );

    let mut crossover_reason = "80 Hz is the THX-recommended crossover for most speakers.".to_string();
    if subs >= 2 {
        crossover_reason.push_str(" Dual subs provide smoother bass; 80 Hz crossover ensures seamless handoff.");
    }
    settings.push(
        ConfigSuggestion::new("Crossover Frequency (all channels)", "80 Hz", "speakers", crossover_reason)
            .at(paths.get("crossover")),
    );

    if subs >= 2 {
        settings.push(
            ConfigSuggestion::new(
                "Subwoofer Mode",
                "LFE + Main (both subs active)",
                "speakers",
                "Dual subs provide even bass distribution and reduce room mode nulls.",
            )
            .at(paths.get("speaker_setup")),
        );
    }

    if speakers.atmos_capable {
        let height = match overhead {
            2 => Some((
                "Front Height or Top Middle",
                "With 2 height channels, Top Middle or Front Height gives the best Atmos overhead coverage. \
                 Top Middle preferred for ceiling-mounted; Front Height for upfiring modules.",
            )),
            4 => Some((
                "Top Front + Top Rear (or Front Height + Rear Height)",
                "4 height channels provide full Atmos hemisphere. \
                 Top Front + Top Rear for ceiling; Front Height + Rear Height for upfiring.",
            )),
            _ => None,
        };
        if let Some((value, reason)) = height {
            settings.push(
                ConfigSuggestion::new("Height Speaker Assignment", value, "speakers", reason)
                    .at(paths.get("speaker_setup")),
            );
        }

        settings.push(
            ConfigSuggestion::new(
                "Surround Decode Mode",
                "Dolby Atmos / DTS:X (Auto)",
                "processing",
                "Auto mode decodes native Atmos/DTS:X tracks and upmixes stereo/5.1 content to height speakers.",
            )
            .at(paths.get("surround_decode")),
        );
        recs.push(Recommendation::info(
            format!("Atmos Configuration for {}", receiver.name),
            format!(
                "Your {} layout with {} supports Dolby Atmos and DTS:X. \
                 Ensure surround decode is set to Auto to engage height channels for object-based audio.",
                speakers.layout, receiver.name
            ),
        ));
    }

    settings.push(
        ConfigSuggestion::new(
            "HDMI Audio Output",
            "AMP (decode in AVR)",
            "audio_routing",
            "Route audio decoding to AVR rather than passing through to TV/projector.",
        )
        .at(paths.get("hdmi_audio")),
    );

    if receiver.earc_support {
        settings.push(
            ConfigSuggestion::new(
                "eARC",
                "Enabled",
                "audio_routing",
                "eARC enables lossless Atmos (TrueHD MAT) and DTS:X passthrough from display or Vrroom.",
            )
            .at(paths.get("earc")),
        );
    }

    if let Some(rc) = receiver.room_correction.as_deref().filter(|rc| !rc.is_empty()) {
        settings.push(
            ConfigSuggestion::new(
                format!("Room Correction ({rc})"),
                "Run calibration with all speakers at listening position",
                "calibration",
                format!(
                    "{rc} measures your room acoustics and applies EQ correction. \
                     Run at primary listening position. Use multiple measurement points if supported."
                ),
            )
            .at(paths.get("room_correction")),
        );
        recs.push(Recommendation::warning(
            format!("Run {rc} Calibration"),
            format!(
                "After configuring speaker layout on {}, run {rc} room correction. \
                 This compensates for room acoustics, speaker placement, and distance differences. \
                 Place the microphone at ear height at your primary listening position.",
                receiver.name
            ),
        ));
    }

    settings.push(
        ConfigSuggestion::new(
            "Speaker Distances",
            "Measure from each speaker to listening position",
            "calibration",
            "Correct distance settings ensure all speakers are time-aligned. \
             Measure in a straight line from each speaker cone to your head position.",
        )
        .at(paths.get("distance")),
    );
    settings.push(
        ConfigSuggestion::new(
            "Speaker Levels",
            "Calibrate to 75 dB SPL at listening position (use SPL meter or room correction)",
            "calibration",
            "All speakers should measure the same SPL at the listening position. \
             Room correction typically handles this, or use an SPL meter app with test tones.",
        )
        .at(paths.get("level")),
    );

    (recs, settings)
}

struct DisplayRow {
    setting: &'static str,
    recommended_key: &'static str,
    category: &'static str,
    path_key: &'static str,
    reason: &'static str,
}

const PICTURE_ROWS: [DisplayRow; 6] = [
    DisplayRow {
        setting: "Picture Mode (SDR content)",
        recommended_key: "color_mode_sdr",
        category: "picture",
        path_key: "picture_mode",
        reason: "Natural or Cinema modes provide the most accurate colors for SDR content \
                 with proper BT.709 color space and 2.2-2.4 gamma.",
    },
    DisplayRow {
        setting: "Picture Mode (HDR content)",
        recommended_key: "color_mode_hdr",
        category: "picture",
        path_key: "picture_mode",
        reason: "HDR picture mode applies appropriate tone mapping and \
                 BT.2020 wide color gamut processing for HDR10/HLG content.",
    },
    DisplayRow {
        setting: "HDR10 Dynamic Range",
        recommended_key: "hdr10_dynamic_range",
        category: "picture",
        path_key: "hdr_setting",
        reason: "Controls how HDR tone mapping maps the source brightness range to your display's capability. \
                 Auto works for most content; a value of 16 works well in fully dark rooms.",
    },
    DisplayRow {
        setting: "Color Temperature",
        recommended_key: "color_temp",
        category: "picture",
        path_key: "color_temp",
        reason: "D65 (6500K) is the reference white point for both SDR and HDR content. \
                 Warm/Warm2 presets on most displays approximate D65.",
    },
    DisplayRow {
        setting: "Gamma (SDR)",
        recommended_key: "gamma_sdr",
        category: "picture",
        path_key: "gamma",
        reason: "For a dark dedicated theater room, gamma 2.4 (BT.1886) is ideal. \
                 For rooms with some ambient light, use 2.2. Adjust based on viewing conditions.",
    },
    DisplayRow {
        setting: "Frame Interpolation / Motion Smoothing",
        recommended_key: "frame_interpolation",
        category: "processing",
        path_key: "frame_interp",
        reason: "Off preserves the filmmaker's intended 24fps cadence (no soap opera effect). \
                 Low setting can help with judder on some displays without the soap opera look.",
    },
];

const PROJECTOR_ROWS: [DisplayRow; 2] = [
    DisplayRow {
        setting: "Light Source Mode",
        recommended_key: "light_source_mode",
        category: "projector",
        path_key: "power_mode",
        reason: "Adjust laser/lamp output to room conditions. Lower output in fully dark rooms \
                 preserves contrast and extends light source life.",
    },
    DisplayRow {
        setting: "Aspect Ratio",
        recommended_key: "aspect_ratio",
        category: "projector",
        path_key: "aspect_ratio",
        reason: "Auto handles 16:9 and letterboxed content. Use Anamorphic/Lens Memory \
                 for constant image height setups with CinemaScope screens.",
    },
];

fn rows(display: &DisplayProfile, table: &[DisplayRow], out: &mut Vec<ConfigSuggestion>) {
    for row in table {
        let Some(value) = display
            .recommended_settings
            .get(row.recommended_key)
            .filter(|v| !v.is_empty())
        else {
            continue;
        };
        out.push(
            ConfigSuggestion::new(row.setting, value.clone(), row.category, row.reason)
                .at_path(display.config_paths.get(row.path_key)),
        );
    }
}

/// Display menu settings, plus projector and screen pairing notes.
pub(super) fn display(eq: &ResolvedEquipment<'_>) -> (Vec<Recommendation>, Vec<ConfigSuggestion>) {
    let mut recs = Vec::new();
    let mut settings = Vec::new();
    let Some(display) = eq.display else {
        return (recs, settings);
    };
    if display.config_paths.is_empty() && display.recommended_settings.is_empty() {
        return (recs, settings);
    }

    let signal_path = display.config_paths.get("hdmi_signal");
    let signal_value = display
        .recommended_settings
        .get("hdmi_signal_format")
        .filter(|v| !v.is_empty());
    if signal_path.is_some() || signal_value.is_some() {
        settings.push(
            ConfigSuggestion::new(
                "HDMI Signal Format",
                signal_value.map_or("Enhanced / Expanded (required for 4K HDR)", String::as_str),
                "input",
                "HDMI inputs must be set to Enhanced/Expanded mode to accept 4K HDR 10-bit signals. \
                 Standard mode limits to 8-bit SDR.",
            )
            .at_path(signal_path),
        );
    }

    rows(display, &PICTURE_ROWS, &mut settings);

    if !display.is_projector() {
        recs.push(Recommendation::info(
            format!("{} Settings", display.name),
            "Review the display settings below for recommended picture modes and HDR calibration.",
        ));
        return (recs, settings);
    }

    rows(display, &PROJECTOR_ROWS, &mut settings);
    if display.lens_memory {
        settings.push(
            ConfigSuggestion::new(
                "Lens Memory",
                "Configure presets for 16:9 and 2.35:1 aspect ratios",
                "projector",
                "Lens memory stores zoom/shift positions for different aspect ratios. \
                 Set one preset for 16:9 (full screen) and one for 2.35:1 (scope) if using CinemaScope screen.",
            )
            .at_path(display.config_paths.get("lens_memory")),
        );
    }

    if let Some(screen) = eq.screen {
        recs.push(Recommendation::info(
            format!("Projector + Screen: {} on {}", display.name, screen.name),
            screen_note(screen),
        ));
        if screen.acoustically_transparent {
            recs.push(Recommendation::info(
                "Acoustically Transparent Screen Detected",
                "Place your front L/C/R speakers directly behind the screen for phantom-free \
                 center channel and seamless sound-to-image integration. AT screens typically \
                 have slightly lower gain than solid screens.",
            ));
        }
    }

    recs.push(Recommendation::info(
        format!("{} Optimization Guide", display.name),
        "Review the display settings below for recommended picture modes, HDR calibration, \
         and projector-specific settings. Settings are tailored to this specific display model.",
    ));
    (recs, settings)
}

fn screen_note(screen: &ScreenProfile) -> String {
    // `{:?}` keeps the trailing ".0" on whole gains.
    let gain = format!("{:?}", screen.gain);
    let mut note = format!("Screen gain: {gain}. ");
    if screen.acoustically_transparent {
        note.push_str("Acoustically transparent screen - place L/C/R behind screen for best imaging. ");
    }
    if screen.ambient_light_rejecting {
        note.push_str("ALR screen - good for rooms with ambient light but may affect off-axis viewing. ");
    }
    if screen.gain >= 1.0 {
        note.push_str(&format!("With {gain} gain, no brightness compensation needed."));
    } else {
        note.push_str(&format!(
            "With {gain} gain, increase projector brightness to compensate for light loss."
        ));
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::core::EquipmentSelection;

    fn resolve_with<R>(selection: EquipmentSelection, f: impl FnOnce(&ResolvedEquipment<'_>) -> R) -> R {
        let catalog = InMemoryCatalog::builtin().expect("builtin");
        let eq = ResolvedEquipment::resolve(&catalog, &selection);
        f(&eq)
    }

    #[test]
    fn baseline_source_paths() {
        let out = resolve_with(
            EquipmentSelection {
                sources: vec!["zidoo_z9x_pro".into()],
                ..Default::default()
            },
            baseline,
        );
        assert_eq!(out.source_settings.len(), 2);
        assert_eq!(out.source_settings[0].setting, "Match Frame Rate (Zidoo Z9X Pro)");
        assert_eq!(
            out.source_settings[1].path.as_deref(),
            Some("Settings > Display > Resolution > 3840x2160p Auto")
        );
    }

    #[test]
    fn receiver_pass_flattens_detailed_paths() {
        let (recs, settings) = resolve_with(
            EquipmentSelection {
                receiver: Some("yamaha_rx_a4a".into()),
                speakers: Some("atmos_5_1_2".into()),
                ..Default::default()
            },
            receiver,
        );
        let names: Vec<_> = settings.iter().map(|s| s.setting.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Speaker Configuration",
                "Crossover Frequency (all channels)",
                "Height Speaker Assignment",
                "Surround Decode Mode",
                "HDMI Audio Output",
                "eARC",
                "Room Correction (YPAO)",
                "Speaker Distances",
                "Speaker Levels",
            ]
        );
        assert_eq!(settings[0].value, "5.1.2 (8 total speakers)");
        assert_eq!(settings[0].path, "Setup > Speaker > Manual Setup > Configuration");
        assert!(!settings[0].steps.is_empty());
        assert_eq!(settings[6].tab, "Speaker");
        assert!(!settings[1].reason.contains("Dual subs"));

        let titles: Vec<_> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Atmos Configuration for Yamaha RX-A4A", "Run YPAO Calibration"]);
    }

    #[test]
    fn receiver_pass_without_speakers_is_empty() {
        let (recs, settings) = resolve_with(
            EquipmentSelection {
                receiver: Some("denon_avr_x3800h".into()),
                ..Default::default()
            },
            receiver,
        );
        assert!(recs.is_empty() && settings.is_empty());
    }

    #[test]
    fn dual_subs_get_sub_mode() {
        let (_, settings) = resolve_with(
            EquipmentSelection {
                receiver: Some("denon_avr_x3800h".into()),
                speakers: Some("surround_5_1".into()),
                ..Default::default()
            },
            receiver,
        );
        assert_eq!(settings[0].value, "5.1 (6 total speakers)");
        assert!(!settings.iter().any(|s| s.setting == "Subwoofer Mode"));

        let (_, settings) = resolve_with(
            EquipmentSelection {
                receiver: Some("denon_avr_x3800h".into()),
                speakers: Some("atmos_7_2_4".into()),
                ..Default::default()
            },
            receiver,
        );
        assert!(settings[1].reason.ends_with("seamless handoff."));
        assert!(settings.iter().any(|s| s.setting == "Subwoofer Mode"));
        assert!(settings.iter().any(|s| s.value.starts_with("Top Front + Top Rear")));
    }

    #[test]
    fn projector_on_alr_screen() {
        let (recs, settings) = resolve_with(
            EquipmentSelection {
                display: Some("epson_eh_ls12000b".into()),
                screen: Some("screen_100_alr".into()),
                ..Default::default()
            },
            display,
        );
        assert_eq!(settings[0].setting, "HDMI Signal Format");
        assert_eq!(settings[0].value, "Expanded (required for 4K HDR)");
        assert!(settings.iter().any(|s| s.setting == "Light Source Mode"));
        assert_eq!(settings.last().map(|s| s.setting.as_str()), Some("Lens Memory"));

        assert_eq!(recs.len(), 2);
        assert_eq!(
            recs[0].description,
            "Screen gain: 0.8. ALR screen - good for rooms with ambient light but may affect \
             off-axis viewing. With 0.8 gain, increase projector brightness to compensate for light loss."
        );
        assert_eq!(recs[1].title, "Epson EH-LS12000b Optimization Guide");
    }

    #[test]
    fn whole_gain_keeps_decimal() {
        let screen = ScreenProfile {
            name: "Flat".into(),
            ..Default::default()
        };
        assert_eq!(
            screen_note(&screen),
            "Screen gain: 1.0. With 1.0 gain, no brightness compensation needed."
        );
    }

    #[test]
    fn tv_without_menu_data_is_skipped() {
        let (recs, settings) = resolve_with(
            EquipmentSelection {
                display: Some("lg_c3_oled".into()),
                ..Default::default()
            },
            display,
        );
        assert!(recs.is_empty() && settings.is_empty());
    }
}
