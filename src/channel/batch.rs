use std::error::Error as _;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use super::{ChannelError, DeviceLink};
use crate::core::{SettingValue, SettingsSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("{0}")]
    Transport(String),
    #[error("device answered `{0}`")]
    Sentinel(String),
    #[error("empty response")]
    Empty,
}

impl FailureReason {
    pub fn transport(err: &ChannelError) -> Self {
        match err.source() {
            Some(src) => FailureReason::Transport(format!("{err}: {src}")),
            None => FailureReason::Transport(err.to_string()),
        }
    }
}

/// One key of a batch query that produced no usable value. Never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{key}: {reason}")]
pub struct QueryFailure {
    pub key: String,
    pub reason: FailureReason,
}

impl QueryFailure {
    pub fn new(key: &str, reason: FailureReason) -> Self {
        Self {
            key: key.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBatch<T> {
    pub items: Vec<(String, T)>,
    pub failures: Vec<QueryFailure>,
}

impl<T> Default for QueryBatch<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> FromIterator<Result<(String, T), QueryFailure>> for QueryBatch<T> {
    fn from_iter<I: IntoIterator<Item = Result<(String, T), QueryFailure>>>(iter: I) -> Self {
        let mut batch = QueryBatch::default();
        for item in iter {
            match item {
                Ok(pair) => batch.items.push(pair),
                Err(failure) => {
                    warn!(key = %failure.key, reason = %failure.reason, "query skipped");
                    batch.failures.push(failure);
                }
            }
        }
        batch
    }
}

impl QueryBatch<SettingValue> {
    pub fn into_snapshot(self) -> (SettingsSnapshot, Vec<QueryFailure>) {
        (self.items.into_iter().collect(), self.failures)
    }
}

/// Reads one setting, classifying sentinel and empty answers as failures.
pub fn read_setting<L: DeviceLink + ?Sized>(
    link: &mut L,
    key: &str,
) -> Result<(String, SettingValue), QueryFailure> {
    let value = link
        .get_setting(key)
        .map_err(|err| QueryFailure::new(key, FailureReason::transport(&err)))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QueryFailure::new(key, FailureReason::Empty));
    }
    if trimmed.eq_ignore_ascii_case("error") || trimmed.eq_ignore_ascii_case("unknown") {
        return Err(QueryFailure::new(
            key,
            FailureReason::Sentinel(trimmed.to_string()),
        ));
    }
    Ok((key.to_string(), SettingValue::from_wire(trimmed)))
}

pub fn query_settings<L: DeviceLink + ?Sized>(
    link: &mut L,
    keys: &[&str],
) -> QueryBatch<SettingValue> {
    keys.iter().map(|key| read_setting(link, key)).collect()
}

pub fn query_statuses<L: DeviceLink + ?Sized>(link: &mut L, ports: &[&str]) -> QueryBatch<String> {
    ports
        .iter()
        .map(|port| {
            let response = link
                .get_status(port)
                .map_err(|err| QueryFailure::new(port, FailureReason::transport(&err)))?;
            if response.is_empty() {
                return Err(QueryFailure::new(port, FailureReason::Empty));
            }
            Ok((port.to_string(), response))
        })
        .collect()
}
