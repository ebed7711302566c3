use serde::Serialize;

use crate::core::SettingValue;

/// Settings read by a full settings fetch, in wire order.
pub const SETTINGS_TO_QUERY: [&str; 30] = [
    "opmode",
    "insel",
    "dhcp",
    "ipaddr",
    "autosw",
    "edidmode",
    "edidfrlflag",
    "edidfrlmode",
    "edidvrrflag",
    "edidallmflag",
    "edidhdrflag",
    "edidhdrmode",
    "ediddvflag",
    "ediddvmode",
    "edidtruehdflag",
    "edidtruehdmode",
    "edidddflag",
    "edidddplusflag",
    "ediddtsflag",
    "ediddtshdflag",
    "edidpcmflag",
    "edidpcmchmode",
    "hdcp",
    "hdrcustom",
    "hdrdisable",
    "cec",
    "earcforce",
    "jvcmacro",
    "oled",
    "oledfade",
];

/// Ports queried with `get status <port>` for a status snapshot.
pub const STATUS_QUERIES: [&str; 7] = ["rx0", "tx0", "tx1", "tx0sink", "tx1sink", "aud0", "audout"];

/// Settings read for the detailed listing.
pub const DETAILED_SETTINGS: [&str; 35] = [
    "opmode",
    "insel",
    "autosw",
    "edidmode",
    "ediddvflag",
    "ediddvmode",
    "edidhdrflag",
    "edidhdrmode",
    "edidvrrflag",
    "edidallmflag",
    "edidfrlflag",
    "edidfrlmode",
    "hdrcustom",
    "hdrdisable",
    "vrr",
    "allm",
    "frl",
    "earc",
    "earcforce",
    "audioout",
    "unmutedelay",
    "downscale",
    "cec",
    "hdcp",
    "oled",
    "oledfade",
    "jvcmacro",
    "edidtruehdflag",
    "edidtruehdmode",
    "edidddflag",
    "edidddplusflag",
    "ediddtsflag",
    "ediddtshdflag",
    "edidpcmflag",
    "edidpcmchmode",
];

/// Settings that shape HDR handling, read during a chain diagnosis.
pub const CHAIN_SETTINGS: [&str; 8] = [
    "edidmode",
    "ediddvflag",
    "ediddvmode",
    "edidhdrflag",
    "edidhdrmode",
    "hdrcustom",
    "lldv",
    "hdrdisable",
];

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum ValueLabels {
    Choices(&'static [(&'static str, &'static str)]),
    Range(&'static str),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SettingMeta {
    pub key: &'static str,
    pub name: &'static str,
    pub menu_path: &'static str,
    pub tab: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<ValueLabels>,
    pub description: &'static str,
}

const ON_OFF: &[(&str, &str)] = &[("on", "Enabled"), ("off", "Disabled")];

const KNOWN: &[SettingMeta] = &[
    SettingMeta {
        key: "edidmode",
        name: "EDID Mode",
        menu_path: "Vrroom Web UI > EDID > MODE",
        tab: "EDID",
        values: Some(ValueLabels::Choices(&[
            ("automix", "AutoMix (Recommended)"),
            ("custom", "Custom EDID"),
            ("fixed", "Fixed"),
            ("copytx0", "Copy TX0"),
            ("copytx1", "Copy TX1"),
        ])),
        description: "How EDID is generated for connected sources",
    },
    SettingMeta {
        key: "ediddvflag",
        name: "Dolby Vision EDID Flag",
        menu_path: "Vrroom Web UI > EDID > DV FLAG",
        tab: "EDID",
        values: Some(ValueLabels::Choices(ON_OFF)),
        description: "Include Dolby Vision capability in EDID",
    },
    SettingMeta {
        key: "ediddvmode",
        name: "Dolby Vision Mode",
        menu_path: "Vrroom Web UI > EDID > DV MODE",
        tab: "EDID",
        values: Some(ValueLabels::Choices(&[
            ("0", "LG C1 (Standard)"),
            ("1", "Custom"),
            ("2", "Remove DV"),
        ])),
        description: "Which DV profile to advertise",
    },
    SettingMeta {
        key: "edidhdrflag",
        name: "HDR EDID Flag",
        menu_path: "Vrroom Web UI > EDID > HDR FLAG",
        tab: "EDID",
        values: Some(ValueLabels::Choices(ON_OFF)),
        description: "Include HDR capability in EDID",
    },
    SettingMeta {
        key: "edidhdrmode",
        name: "HDR Mode",
        menu_path: "Vrroom Web UI > EDID > HDR MODE",
        tab: "EDID",
        values: Some(ValueLabels::Choices(&[
            ("0", "HDR10 only"),
            ("1", "HDR10 + HLG"),
            ("2", "HDR10+"),
            ("3", "HDR10+ + HLG"),
            ("4", "Remove HDR"),
        ])),
        description: "Which HDR formats to advertise in EDID",
    },
    SettingMeta {
        key: "hdrcustom",
        name: "Custom HDR Injection",
        menu_path: "Vrroom Web UI > SIGNAL > HDR CUSTOM",
        tab: "SIGNAL",
        values: Some(ValueLabels::Choices(ON_OFF)),
        description: "Inject custom HDR metadata (auto-disables under VRR)",
    },
    SettingMeta {
        key: "hdrdisable",
        name: "HDR Disable",
        menu_path: "Vrroom Web UI > SIGNAL > HDR DISABLE",
        tab: "SIGNAL",
        values: Some(ValueLabels::Choices(ON_OFF)),
        description: "Strip HDR signalling from the output",
    },
    SettingMeta {
        key: "lldv",
        name: "LLDV (Low Latency DV)",
        menu_path: "Vrroom Web UI > EDID > LLDV",
        tab: "EDID",
        values: Some(ValueLabels::Choices(ON_OFF)),
        description: "Enable LLDV conversion for non-DV displays",
    },
    SettingMeta {
        key: "unmutedelay",
        name: "Audio Unmute Delay",
        menu_path: "Vrroom Web UI > AUDIO > UNMUTE DELAY",
        tab: "AUDIO",
        values: Some(ValueLabels::Range("0-20 (x100ms, e.g., 5 = 500ms)")),
        description: "Delay before unmuting audio after format change to prevent pops",
    },
    SettingMeta {
        key: "vrr",
        name: "VRR (Variable Refresh Rate)",
        menu_path: "Vrroom Web UI > SIGNAL > VRR",
        tab: "SIGNAL",
        values: Some(ValueLabels::Choices(&[
            ("on", "Enabled"),
            ("off", "Disabled"),
            ("force", "Force On"),
        ])),
        description: "Variable Refresh Rate passthrough or injection",
    },
    SettingMeta {
        key: "allm",
        name: "ALLM (Auto Low Latency Mode)",
        menu_path: "Vrroom Web UI > SIGNAL > ALLM",
        tab: "SIGNAL",
        values: Some(ValueLabels::Choices(&[
            ("on", "Enabled"),
            ("off", "Disabled"),
            ("force", "Force On"),
        ])),
        description: "Auto Low Latency Mode passthrough or injection",
    },
    SettingMeta {
        key: "downscale",
        name: "Downscale Output",
        menu_path: "Vrroom Web UI > SIGNAL > DOWNSCALE",
        tab: "SIGNAL",
        values: Some(ValueLabels::Choices(&[
            ("off", "Disabled (native)"),
            ("1080p", "1080p"),
            ("4k", "4K"),
        ])),
        description: "Downscale output resolution",
    },
    SettingMeta {
        key: "frl",
        name: "Fixed Rate Link (HDMI 2.1)",
        menu_path: "Vrroom Web UI > SIGNAL > FRL MODE",
        tab: "SIGNAL",
        values: Some(ValueLabels::Choices(&[
            ("auto", "Auto"),
            ("off", "Disabled (TMDS only)"),
        ])),
        description: "HDMI 2.1 FRL mode for high bandwidth",
    },
    SettingMeta {
        key: "earc",
        name: "eARC Mode",
        menu_path: "Vrroom Web UI > AUDIO > eARC",
        tab: "AUDIO",
        values: Some(ValueLabels::Choices(ON_OFF)),
        description: "Enhanced Audio Return Channel",
    },
    SettingMeta {
        key: "audioout",
        name: "Audio Output Mode",
        menu_path: "Vrroom Web UI > AUDIO > OUTPUT",
        tab: "AUDIO",
        values: Some(ValueLabels::Choices(&[
            ("off", "Disabled"),
            ("spdif", "S/PDIF"),
            ("analog", "Analog"),
            ("all", "All"),
        ])),
        description: "Audio extraction output",
    },
];

pub fn lookup(key: &str) -> Option<&'static SettingMeta> {
    KNOWN.iter().find(|m| m.key == key)
}

/// Metadata for `key`, falling back to generic labels for keys outside the table.
pub fn describe(key: &str) -> SettingMeta {
    lookup(key).copied().unwrap_or(SettingMeta {
        key: "",
        name: "",
        menu_path: "Vrroom Web UI",
        tab: "Settings",
        values: None,
        description: "",
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingDisplay {
    pub key: String,
    pub name: String,
    pub value: SettingValue,
    pub display_value: String,
    pub menu_path: String,
    pub tab: String,
    pub description: String,
    pub is_set: bool,
}

pub fn describe_setting(key: &str, value: &SettingValue) -> SettingDisplay {
    let meta = describe(key);
    let raw = value.to_string();
    let display_value = match meta.values {
        Some(ValueLabels::Choices(choices)) => choices
            .iter()
            .find(|(v, _)| *v == raw)
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| raw.clone()),
        Some(ValueLabels::Range(note)) => format!("{raw} ({note})"),
        None => raw.clone(),
    };
    let name = if meta.name.is_empty() { key } else { meta.name };

    SettingDisplay {
        key: key.to_string(),
        name: name.to_string(),
        value: value.clone(),
        display_value,
        menu_path: meta.menu_path.to_string(),
        tab: meta.tab.to_string(),
        description: meta.description.to_string(),
        is_set: matches!(
            value.normalized().as_str(),
            "on" | "enabled" | "1" | "true" | "yes" | "automix"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_get_labels_and_paths() {
        let d = describe_setting("edidmode", &SettingValue::from("automix"));
        assert_eq!(d.name, "EDID Mode");
        assert_eq!(d.display_value, "AutoMix (Recommended)");
        assert_eq!(d.menu_path, "Vrroom Web UI > EDID > MODE");
        assert!(d.is_set);

        let d = describe_setting("unmutedelay", &SettingValue::Integer(5));
        assert_eq!(d.display_value, "5 (0-20 (x100ms, e.g., 5 = 500ms))");
        assert!(!d.is_set);
    }

    #[test]
    fn unknown_keys_fall_back_to_generic_labels() {
        let d = describe_setting("earcmode", &SettingValue::from("auto earc"));
        assert_eq!(d.name, "earcmode");
        assert_eq!(d.display_value, "auto earc");
        assert_eq!(d.menu_path, "Vrroom Web UI");
        assert_eq!(d.tab, "Settings");
    }

    #[test]
    fn query_lists_have_no_duplicates() {
        for list in [&SETTINGS_TO_QUERY[..], &DETAILED_SETTINGS[..], &CHAIN_SETTINGS[..]] {
            let mut sorted = list.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), list.len());
        }
    }
}
