use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    AvoidBonk,
    LldvNonDv,
    BestAudio,
    GamingLowLatency,
    FixPreroll,
    HdrPassthrough,
    MinimizeFormatSwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Video,
    Audio,
}

impl Goal {
    pub const ALL: [Goal; 7] = [
        Goal::AvoidBonk,
        Goal::LldvNonDv,
        Goal::BestAudio,
        Goal::GamingLowLatency,
        Goal::FixPreroll,
        Goal::HdrPassthrough,
        Goal::MinimizeFormatSwitch,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            Goal::AvoidBonk => "avoid_bonk",
            Goal::LldvNonDv => "lldv_non_dv",
            Goal::BestAudio => "best_audio",
            Goal::GamingLowLatency => "gaming_low_latency",
            Goal::FixPreroll => "fix_preroll",
            Goal::HdrPassthrough => "hdr_passthrough",
            Goal::MinimizeFormatSwitch => "minimize_format_switch",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Goal::AvoidBonk => "Avoid HDMI Bonk / Blank Screen",
            Goal::LldvNonDv => "Dolby Vision on Non-DV Display (LLDV)",
            Goal::BestAudio => "Best Audio Quality (Atmos/DTS:X)",
            Goal::GamingLowLatency => "Gaming / Low Latency",
            Goal::FixPreroll => "Fix Pre-roll Visibility",
            Goal::HdrPassthrough => "4K HDR Passthrough",
            Goal::MinimizeFormatSwitch => "Minimize Format Switching",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Goal::AvoidBonk => {
                "Minimize or eliminate black screen delays during format changes between pre-roll and main content."
            }
            Goal::LldvNonDv => {
                "Enable Dolby Vision content on displays without native DV support via Low Latency Dolby Vision conversion."
            }
            Goal::BestAudio => {
                "Optimize audio routing for highest quality lossless surround sound passthrough."
            }
            Goal::GamingLowLatency => {
                "Enable VRR, ALLM, and minimize processing for the lowest input lag gaming experience."
            }
            Goal::FixPreroll => {
                "Fix issues where pre-roll video shows only 1 frame or black screen while audio plays."
            }
            Goal::HdrPassthrough => {
                "Ensure clean 4K HDR10/HLG passthrough with correct color space and metadata."
            }
            Goal::MinimizeFormatSwitch => {
                "Reduce the number of HDMI re-negotiations by standardizing output format across content types."
            }
        }
    }

    pub const fn category(self) -> GoalCategory {
        match self {
            Goal::BestAudio => GoalCategory::Audio,
            _ => GoalCategory::Video,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Goal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Goal::ALL
            .into_iter()
            .find(|g| g.id() == needle)
            .ok_or_else(|| {
                let known: Vec<&str> = Goal::ALL.iter().map(|g| g.id()).collect();
                format!("unknown goal: {s} (expected one of {})", known.join("|"))
            })
    }
}
