use serde::{Deserialize, Serialize};

use crate::core::{SettingValue, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_value: Option<SettingValue>,
}

impl Issue {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
            setting: None,
            current_value: None,
            recommended_value: None,
        }
    }

    pub fn on_setting(
        mut self,
        setting: impl Into<String>,
        current: impl Into<SettingValue>,
        recommended: impl Into<SettingValue>,
    ) -> Self {
        self.setting = Some(setting.into());
        self.current_value = Some(current.into());
        self.recommended_value = Some(recommended.into());
        self
    }

    /// The `(key, value)` pair a corrected snapshot should take, if this issue is auto-applicable.
    pub fn correction(&self) -> Option<(&str, &SettingValue)> {
        if !self.severity.is_actionable() {
            return None;
        }
        match (&self.setting, &self.recommended_value) {
            (Some(key), Some(value)) => Some((key.as_str(), value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_value: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Recommendation {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
            setting: None,
            current_value: None,
            recommended_value: None,
            menu_path: None,
            command: None,
        }
    }

    pub fn critical(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Critical, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, description)
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, description)
    }

    /// Attaches the setting change together with the wire command and menu path that perform it.
    pub fn with_change(
        mut self,
        setting: &str,
        current: impl Into<SettingValue>,
        recommended: impl Into<SettingValue>,
    ) -> Self {
        let recommended = recommended.into();
        self.command = Some(format!("set {setting} {recommended}"));
        self.menu_path = Some(crate::core::vocabulary::describe(setting).menu_path.to_string());
        self.setting = Some(setting.to_string());
        self.current_value = Some(current.into());
        self.recommended_value = Some(recommended);
        self
    }
}
