//! Interaction records - one per user turn.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sylva_catalog::{ArchetypeId, Subsystem};
use uuid::Uuid;

/// Unique identifier of an interaction.
///
/// Kept as a string so ledgers written with date-stamped ids still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionId(pub String);

impl InteractionId {
    /// Create a new random interaction ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for InteractionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one running session. Regenerated every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Placeholder for records written before sessions were tracked.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single exchange. Created once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(alias = "interaction_id", default)]
    pub id: InteractionId,

    /// Creation time (UTC).
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(default = "SessionId::unknown")]
    pub session_id: SessionId,

    /// What the user wrote.
    #[serde(rename = "user_input")]
    pub input: String,

    /// What was answered.
    #[serde(rename = "sylva_response")]
    pub response: String,

    pub subsystem: Subsystem,

    #[serde(default = "ArchetypeId::unknown")]
    pub archetype_id: ArchetypeId,
}

impl InteractionRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        session_id: SessionId,
        input: impl Into<String>,
        response: impl Into<String>,
        subsystem: Subsystem,
        archetype_id: ArchetypeId,
    ) -> Self {
        Self {
            id: InteractionId::new(),
            timestamp: Utc::now(),
            session_id,
            input: input.into(),
            response: response.into(),
            subsystem,
            archetype_id,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// RFC 3339, or a zone-less ISO 8601 time read as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
