use serde::{Deserialize, Serialize};

use crate::core::{
    ChainStage, HdrFormat, Issue, Recommendation, SettingsSnapshot, SignalDescriptor, StageKind,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrInput {
    pub detected: bool,
    pub format: HdrFormat,
    pub details: Option<SignalDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrProcessing {
    pub lldv_active: bool,
    pub hdr_inject: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrOutput {
    pub format: HdrFormat,
    pub details: Option<SignalDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrStatus {
    pub input: HdrInput,
    pub processing: HdrProcessing,
    pub output: HdrOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    pub device: String,
    pub signal_chain: Vec<ChainStage>,
    pub hdr_status: HdrStatus,
    pub settings: SettingsSnapshot,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
}

impl Diagnosis {
    pub fn stages(&self, kind: StageKind) -> impl Iterator<Item = &ChainStage> {
        self.signal_chain.iter().filter(move |s| s.kind == kind)
    }
}
