use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub display_type: String,
    pub native_dv: bool,
    pub lldv_compatible: bool,
    pub vrr_support: bool,
    pub allm_support: bool,
    pub handshake_time_ms: u32,
    pub hdr_support: Vec<String>,
    pub lens_memory: bool,
    pub config_paths: BTreeMap<String, String>,
    pub recommended_settings: BTreeMap<String, String>,
}

impl DisplayProfile {
    pub fn is_projector(&self) -> bool {
        self.display_type.eq_ignore_ascii_case("projector")
    }

    pub fn has_slow_handshake(&self) -> bool {
        self.handshake_time_ms >= SLOW_HANDSHAKE_MS
    }
}

pub const SLOW_HANDSHAKE_MS: u32 = 2500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixProfile {
    pub name: String,
    pub lldv_support: bool,
    pub vrr_support: bool,
    pub allm_support: bool,
    pub earc_support: bool,
}

/// A menu location on a device, either a bare path or a detailed walkthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavPath {
    Plain(String),
    Detailed {
        path: String,
        #[serde(default)]
        steps: Vec<String>,
        #[serde(default)]
        tab: String,
        #[serde(default)]
        recommended: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverProfile {
    pub name: String,
    pub earc_support: bool,
    pub handshake_time_ms: u32,
    pub room_correction: Option<String>,
    pub config_paths: BTreeMap<String, NavPath>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceProfile {
    pub name: String,
    pub dv_output: bool,
    pub lldv_output: bool,
    pub max_refresh: u32,
    pub match_frame_rate: bool,
    pub match_resolution: bool,
    pub settings_paths: BTreeMap<String, String>,
}

impl SourceProfile {
    pub fn settings_path(&self, kind: &str) -> Option<String> {
        self.settings_paths.get(kind).cloned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerProfile {
    pub name: String,
    pub layout: String,
    pub channels: u32,
    pub overhead_channels: u32,
    pub sub_channels: u32,
    pub atmos_capable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenProfile {
    pub name: String,
    pub gain: f64,
    pub acoustically_transparent: bool,
    pub ambient_light_rejecting: bool,
}

impl Default for ScreenProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            gain: 1.0,
            acoustically_transparent: false,
            ambient_light_rejecting: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaServerProfile {
    pub name: String,
}

/// Catalog ids picked by the user, one slot per equipment category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentSelection {
    pub display: Option<String>,
    #[serde(alias = "hdfury_device")]
    pub matrix: Option<String>,
    #[serde(alias = "avr")]
    pub receiver: Option<String>,
    pub sources: Vec<String>,
    pub speakers: Option<String>,
    pub screen: Option<String>,
    pub media_servers: Vec<String>,
}
