use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub const fn as_str(self) -> &'static str {
        match self {
            Switch::On => "on",
            Switch::Off => "off",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Some(Switch::On),
            "off" => Some(Switch::Off),
            _ => None,
        }
    }
}

/// A setting value as read from the box or from an exported document.
///
/// Deserialization tries the variants top to bottom, so JSON numbers become `Integer`,
/// the literal strings `"on"`/`"off"` become `Switch`, other strings become `Text`,
/// booleans become `Flag`, and anything else is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Switch(Switch),
    Text(String),
    Flag(bool),
    Other(serde_json::Value),
}

impl SettingValue {
    /// Interprets a token received over the wire.
    pub fn from_wire(token: &str) -> Self {
        let token = token.trim();
        if let Some(switch) = Switch::parse(token) {
            return SettingValue::Switch(switch);
        }
        if let Ok(n) = token.parse::<i64>() {
            return SettingValue::Integer(n);
        }
        SettingValue::Text(token.to_string())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(n) => Some(*n),
            SettingValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<Switch> {
        match self {
            SettingValue::Switch(s) => Some(*s),
            SettingValue::Text(s) => Switch::parse(s),
            _ => None,
        }
    }

    /// Lowercased textual form, used for case-insensitive comparisons.
    pub fn normalized(&self) -> String {
        self.to_string().trim().to_ascii_lowercase()
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            SettingValue::Integer(n) => *n != 0,
            SettingValue::Switch(s) => *s == Switch::On,
            SettingValue::Text(s) => !s.is_empty(),
            SettingValue::Flag(b) => *b,
            SettingValue::Other(v) => match v {
                serde_json::Value::Null => false,
                serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                serde_json::Value::Array(a) => !a.is_empty(),
                serde_json::Value::Object(o) => !o.is_empty(),
                _ => true,
            },
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Integer(n) => write!(f, "{n}"),
            SettingValue::Switch(s) => f.write_str(s.as_str()),
            SettingValue::Text(s) => f.write_str(s),
            SettingValue::Flag(b) => write!(f, "{b}"),
            SettingValue::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Integer(n)
    }
}

impl From<i32> for SettingValue {
    fn from(n: i32) -> Self {
        SettingValue::Integer(i64::from(n))
    }
}

impl From<Switch> for SettingValue {
    fn from(s: Switch) -> Self {
        SettingValue::Switch(s)
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Flag(b)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        match Switch::parse(s) {
            Some(switch) if s == switch.as_str() => SettingValue::Switch(switch),
            _ => SettingValue::Text(s.to_string()),
        }
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::from(s.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("settings snapshot is not valid JSON")]
    Malformed(#[source] serde_json::Error),
    #[error("settings snapshot must be a JSON object of setting keys, found {0}")]
    NotAnObject(&'static str),
}

pub const BOOKKEEPING_PREFIX: char = '_';

pub fn is_bookkeeping_key(key: &str) -> bool {
    key.starts_with(BOOKKEEPING_PREFIX)
}

/// Setting key to value map. Unknown keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSnapshot(BTreeMap<String, SettingValue>);

impl SettingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an exported settings document.
    ///
    /// A backup document (`{"vrroom_backup": true, "settings": {...}}`) is unwrapped to its
    /// `settings` object.
    pub fn from_json_str(s: &str) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(s).map_err(SnapshotError::Malformed)?;
        let mut object = match value {
            serde_json::Value::Object(map) => map,
            other => return Err(SnapshotError::NotAnObject(json_kind(&other))),
        };

        let is_backup = object
            .get("vrroom_backup")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if is_backup {
            object = match object.remove("settings") {
                Some(serde_json::Value::Object(inner)) => inner,
                Some(other) => return Err(SnapshotError::NotAnObject(json_kind(&other))),
                None => serde_json::Map::new(),
            };
        }

        let mut snapshot = Self::new();
        for (key, raw) in object {
            let value = serde_json::from_value::<SettingValue>(raw).map_err(SnapshotError::Malformed)?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    /// Lowercased value of `key`, or `default` when absent.
    pub fn normalized_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .map(SettingValue::normalized)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn extend(&mut self, other: SettingsSnapshot) {
        self.0.extend(other.0);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.0.iter()
    }

    /// Entries excluding `_`-prefixed bookkeeping keys.
    pub fn settings(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.0.iter().filter(|(k, _)| !is_bookkeeping_key(k))
    }
}

impl FromIterator<(String, SettingValue)> for SettingsSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SettingsSnapshot {
    type Item = (String, SettingValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, SettingValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
