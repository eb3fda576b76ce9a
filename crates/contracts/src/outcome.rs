//! DispatchOutcome - result of a single delivery attempt

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SeverityTier;

/// Logical sink name
///
/// `Unknown` never has a writer; it marks outcomes of records that could not
/// be decoded and therefore were never routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicName {
    Database,
    Alert,
    Unknown,
}

impl TopicName {
    /// Sinks that get a writer
    pub const SINKS: [TopicName; 2] = [TopicName::Database, TopicName::Alert];

    pub fn as_str(self) -> &'static str {
        match self {
            TopicName::Database => "database",
            TopicName::Alert => "alert",
            TopicName::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One per delivery attempt (not per record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Record timestamp, or the wall clock for undecodable records
    pub time: f64,
    pub topic: TopicName,
    pub success: bool,
    /// `None` only for decode failures
    pub level: Option<SeverityTier>,
    /// Record message, or the decode error for undecodable records
    pub message: String,
    /// Source offset of the record this attempt belongs to
    pub offset: u64,
}

impl DispatchOutcome {
    pub fn is_decode_failure(&self) -> bool {
        self.topic == TopicName::Unknown
    }
}
