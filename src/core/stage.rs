use serde::{Deserialize, Serialize};

use crate::core::SignalDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Input,
    Metadata,
    Output,
    Sink,
}

impl StageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            StageKind::Input => "input",
            StageKind::Metadata => "metadata",
            StageKind::Output => "output",
            StageKind::Sink => "sink",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataKind {
    #[serde(rename = "HDR metadata present")]
    Hdr,
    #[serde(rename = "Dolby Vision metadata")]
    DolbyVision,
}

impl MetadataKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            MetadataKind::Hdr => "HDR metadata present",
            MetadataKind::DolbyVision => "Dolby Vision metadata",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpdInfo {
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub hdr_metadata: Option<MetadataKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkCapabilities {
    pub hdr_capable: bool,
    pub dv_capable: bool,
    pub vrr_capable: bool,
    pub max_resolution: Option<String>,
    pub supported_formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStage {
    pub stage: String,
    pub kind: StageKind,
    pub port: String,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spd: Option<SpdInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<SinkCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainStage {
    fn bare(stage: String, kind: StageKind, port: &str) -> Self {
        Self {
            stage,
            kind,
            port: port.to_string(),
            connected: false,
            signal: None,
            spd: None,
            sink: None,
            raw: None,
            error: None,
        }
    }

    pub fn connected(stage: String, kind: StageKind, port: &str, signal: SignalDescriptor) -> Self {
        Self {
            connected: true,
            signal: Some(signal),
            ..Self::bare(stage, kind, port)
        }
    }

    pub fn disconnected(stage: String, kind: StageKind, port: &str, raw: String) -> Self {
        Self {
            raw: Some(raw),
            ..Self::bare(stage, kind, port)
        }
    }

    pub fn metadata(stage: String, port: &str, raw: String, spd: SpdInfo) -> Self {
        Self {
            connected: true,
            spd: Some(spd),
            raw: Some(raw),
            ..Self::bare(stage, StageKind::Metadata, port)
        }
    }

    pub fn sink(stage: String, port: &str, raw: String, caps: SinkCapabilities) -> Self {
        Self {
            connected: true,
            sink: Some(caps),
            raw: Some(raw),
            ..Self::bare(stage, StageKind::Sink, port)
        }
    }

    pub fn failed(stage: String, kind: StageKind, port: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::bare(stage, kind, port)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
