use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub const fn is_actionable(self) -> bool {
        matches!(self, Severity::Critical | Severity::Warning)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "invalid severity: {other} (expected critical|warning|info)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCount {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCount {
    pub fn tally<'a>(severities: impl IntoIterator<Item = &'a Severity>) -> Self {
        let mut count = Self::default();
        for severity in severities {
            match severity {
                Severity::Critical => count.critical += 1,
                Severity::Warning => count.warning += 1,
                Severity::Info => count.info += 1,
            }
        }
        count
    }

    pub fn actionable(&self) -> usize {
        self.critical + self.warning
    }
}
