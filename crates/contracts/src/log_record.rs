//! LogRecord - decoded log event and its severity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::DecodeError;

/// Severity tier, ordered by escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityTier {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl SeverityTier {
    /// All tiers, lowest first
    pub const ALL: [SeverityTier; 5] = [
        SeverityTier::Debug,
        SeverityTier::Info,
        SeverityTier::Warn,
        SeverityTier::Error,
        SeverityTier::Fatal,
    ];

    /// ERROR and FATAL records are routed to the alert sink as well
    pub fn is_alert_worthy(self) -> bool {
        self >= SeverityTier::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeverityTier::Debug => "DEBUG",
            SeverityTier::Info => "INFO",
            SeverityTier::Warn => "WARN",
            SeverityTier::Error => "ERROR",
            SeverityTier::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityTier {
    type Err = DecodeError;

    /// Case-insensitive; `WARNING` is accepted for `WARN`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tier = match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => SeverityTier::Debug,
            "INFO" => SeverityTier::Info,
            "WARN" | "WARNING" => SeverityTier::Warn,
            "ERROR" => SeverityTier::Error,
            "FATAL" => SeverityTier::Fatal,
            _ => {
                return Err(DecodeError::UnknownLevel {
                    level: s.to_string(),
                })
            }
        };
        Ok(tier)
    }
}

impl<'de> Deserialize<'de> for SeverityTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Decoded log event
///
/// Immutable once decoded; never persisted by the processor itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Producer timestamp (seconds)
    pub timestamp: f64,
    pub level: SeverityTier,
    pub message: String,
}

/// Where a classified record goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    DatabaseOnly,
    AlertAndDatabase,
}

impl RoutingDecision {
    pub fn for_level(level: SeverityTier) -> Self {
        if level.is_alert_worthy() {
            RoutingDecision::AlertAndDatabase
        } else {
            RoutingDecision::DatabaseOnly
        }
    }

    /// Number of delivery attempts this decision schedules
    pub fn attempt_count(self) -> usize {
        match self {
            RoutingDecision::DatabaseOnly => 1,
            RoutingDecision::AlertAndDatabase => 2,
        }
    }
}
