mod diagnosis;
mod equipment;
mod goal;
mod issue;
mod settings;
mod severity;
mod signal;
mod stage;
pub mod vocabulary;

pub use diagnosis::{Diagnosis, HdrInput, HdrOutput, HdrProcessing, HdrStatus};
pub use equipment::{
    DisplayProfile, EquipmentSelection, MatrixProfile, MediaServerProfile, NavPath,
    ReceiverProfile, SLOW_HANDSHAKE_MS, ScreenProfile, SourceProfile, SpeakerProfile,
};
pub use goal::{Goal, GoalCategory};
pub use issue::{Issue, Recommendation};
pub use settings::{
    SettingValue, SettingsSnapshot, SnapshotError, Switch, is_bookkeeping_key,
};
pub use severity::{Severity, SeverityCount};
pub use signal::{ColorFormat, Colorimetry, HdrFormat, ScanType, SignalDescriptor};
pub use stage::{ChainStage, MetadataKind, SinkCapabilities, SpdInfo, StageKind};
