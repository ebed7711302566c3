mod goals;
mod passes;

use std::collections::HashSet;
use std::hash::Hash;

use serde::Serialize;
use tracing::warn;

use crate::catalog::ProfileCatalog;
use crate::core::vocabulary::{SettingDisplay, describe_setting};
use crate::core::{
    DisplayProfile, EquipmentSelection, Goal, MatrixProfile, MediaServerProfile, NavPath,
    ReceiverProfile, Recommendation, ScreenProfile, SettingsSnapshot, SourceProfile,
    SpeakerProfile,
};

pub use goals::handler;

const NOT_SPECIFIED: &str = "Not specified";

/// A setting the user changes by hand on a source device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSetting {
    pub setting: String,
    pub value: String,
    pub device: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A receiver or display menu setting, with the menu walkthrough when the catalog has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSuggestion {
    pub setting: String,
    pub value: String,
    pub category: String,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tab: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub recommended: String,
    pub reason: String,
}

impl ConfigSuggestion {
    fn new(setting: impl Into<String>, value: impl Into<String>, category: &str, reason: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
            value: value.into(),
            category: category.to_string(),
            path: String::new(),
            steps: Vec::new(),
            tab: String::new(),
            recommended: String::new(),
            reason: reason.into(),
        }
    }

    fn at(mut self, nav: Option<&NavPath>) -> Self {
        match nav {
            Some(NavPath::Plain(path)) => self.path = path.clone(),
            Some(NavPath::Detailed {
                path,
                steps,
                tab,
                recommended,
            }) => {
                self.path = path.clone();
                self.steps = steps.clone();
                self.tab = tab.clone();
                self.recommended = recommended.clone();
            }
            None => {}
        }
        self
    }

    fn at_path(mut self, path: Option<&String>) -> Self {
        self.path = path.cloned().unwrap_or_default();
        self
    }
}

/// What one goal handler contributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalOutput {
    pub recommendations: Vec<Recommendation>,
    pub patch: SettingsSnapshot,
    pub source_settings: Vec<DeviceSetting>,
}

/// Catalog profiles for a selection. Unknown ids leave their slot empty.
#[derive(Debug, Clone, Default)]
pub struct ResolvedEquipment<'a> {
    pub display: Option<&'a DisplayProfile>,
    pub matrix: Option<&'a MatrixProfile>,
    pub receiver: Option<&'a ReceiverProfile>,
    pub sources: Vec<(&'a str, &'a SourceProfile)>,
    pub speakers: Option<(&'a str, &'a SpeakerProfile)>,
    pub screen: Option<&'a ScreenProfile>,
    pub media_servers: Vec<(&'a str, &'a MediaServerProfile)>,
}

impl<'a> ResolvedEquipment<'a> {
    pub fn resolve<C: ProfileCatalog + ?Sized>(catalog: &'a C, selection: &'a EquipmentSelection) -> Self {
        Self {
            display: selection
                .display
                .as_deref()
                .and_then(|id| known("displays", id, catalog.display(id)))
                .map(|(_, p)| p),
            matrix: selection
                .matrix
                .as_deref()
                .and_then(|id| known("matrices", id, catalog.matrix(id)))
                .map(|(_, p)| p),
            receiver: selection
                .receiver
                .as_deref()
                .and_then(|id| known("receivers", id, catalog.receiver(id)))
                .map(|(_, p)| p),
            sources: selection
                .sources
                .iter()
                .filter_map(|id| known("sources", id, catalog.source(id)))
                .collect(),
            speakers: selection
                .speakers
                .as_deref()
                .and_then(|id| known("speakers", id, catalog.speakers(id))),
            screen: selection
                .screen
                .as_deref()
                .and_then(|id| known("screens", id, catalog.screen(id)))
                .map(|(_, p)| p),
            media_servers: selection
                .media_servers
                .iter()
                .filter_map(|id| known("media_servers", id, catalog.media_server(id)))
                .collect(),
        }
    }

    fn primary_source(&self) -> Option<(&'a str, &'a SourceProfile)> {
        self.sources.first().copied()
    }

    fn primary_media_server(&self) -> Option<(&'a str, &'a MediaServerProfile)> {
        self.media_servers.first().copied()
    }
}

fn known<'a, T>(category: &str, id: &'a str, found: Option<&'a T>) -> Option<(&'a str, &'a T)> {
    if id.is_empty() {
        return None;
    }
    if found.is_none() {
        warn!(category, id, "unknown catalog id; slot left empty");
    }
    found.map(|p| (id, p))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupSummary {
    pub display: String,
    pub matrix: String,
    pub receiver: String,
    pub sources: Vec<String>,
    pub speakers: String,
    pub screen: String,
    pub media_servers: Vec<String>,
    pub goals: Vec<String>,
}

impl SetupSummary {
    fn new(eq: &ResolvedEquipment<'_>, goals: &[Goal]) -> Self {
        fn name_or(name: Option<&str>) -> String {
            name.unwrap_or(NOT_SPECIFIED).to_string()
        }
        fn names_or(names: Vec<String>) -> Vec<String> {
            if names.is_empty() {
                vec![NOT_SPECIFIED.to_string()]
            } else {
                names
            }
        }

        Self {
            display: name_or(eq.display.map(|p| p.name.as_str())),
            matrix: name_or(eq.matrix.map(|p| p.name.as_str())),
            receiver: name_or(eq.receiver.map(|p| p.name.as_str())),
            sources: names_or(eq.sources.iter().map(|(_, p)| p.name.clone()).collect()),
            speakers: name_or(eq.speakers.map(|(_, p)| p.name.as_str())),
            screen: name_or(eq.screen.map(|p| p.name.as_str())),
            media_servers: names_or(eq.media_servers.iter().map(|(_, p)| p.name.clone()).collect()),
            goals: goals.iter().map(|g| g.name().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Synthesis {
    pub summary: SetupSummary,
    pub recommendations: Vec<Recommendation>,
    pub settings_patch: SettingsSnapshot,
    pub settings_patch_detailed: Vec<SettingDisplay>,
    pub source_settings: Vec<DeviceSetting>,
    pub receiver_settings: Vec<ConfigSuggestion>,
    pub display_settings: Vec<ConfigSuggestion>,
    pub artifact: Option<String>,
}

/// Builds recommendations for `selection` and `goals`. Pure; writing the patch artifact is left to the caller.
pub fn synthesize<C: ProfileCatalog + ?Sized>(
    catalog: &C,
    selection: &EquipmentSelection,
    goals: &[Goal],
) -> Synthesis {
    let eq = ResolvedEquipment::resolve(catalog, selection);

    let mut recommendations = Vec::new();
    let mut patch = SettingsSnapshot::new();
    let mut source_settings = Vec::new();
    let mut absorb = |out: GoalOutput| {
        recommendations.extend(out.recommendations);
        patch.extend(out.patch);
        source_settings.extend(out.source_settings);
    };

    for goal in goals {
        absorb(handler(*goal)(&eq));
    }
    absorb(passes::baseline(&eq));

    let (receiver_recs, receiver_settings) = passes::receiver(&eq);
    let (display_recs, display_settings) = passes::display(&eq);
    recommendations.extend(receiver_recs);
    recommendations.extend(display_recs);

    let recommendations = dedup_by(recommendations, |r| r.title.clone());
    let source_settings = dedup_by(source_settings, |s| (s.setting.clone(), s.device.clone()));
    let settings_patch_detailed = patch.iter().map(|(k, v)| describe_setting(k, v)).collect();

    Synthesis {
        summary: SetupSummary::new(&eq, goals),
        recommendations,
        settings_patch: patch,
        settings_patch_detailed,
        source_settings,
        receiver_settings,
        display_settings,
        artifact: None,
    }
}

/// Keeps the first item for each key, preserving order.
fn dedup_by<T, K: Eq + Hash>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}
