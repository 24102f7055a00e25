//! The persisted ledger document: interactions plus activity counts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use sylva_catalog::Subsystem;

use super::record::{deserialize_timestamp, InteractionRecord};

/// Ledger format written by this crate.
pub const LEDGER_VERSION: &str = "3.0";

/// Descriptive block at the head of the ledger file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerMetadata {
    #[serde(deserialize_with = "deserialize_timestamp", default = "Utc::now")]
    pub created: DateTime<Utc>,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for LedgerMetadata {
    fn default() -> Self {
        Self {
            created: Utc::now(),
            version: LEDGER_VERSION.to_string(),
            description: "SYLVA interaction memory with subsystem tracking".to_string(),
        }
    }
}

/// Ordered interactions and their per-subsystem tally.
///
/// Insertion order is chronological order. `activity` always equals the
/// count of records per subsystem; the three archetypal subsystems are
/// always present, at zero if unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub metadata: LedgerMetadata,

    #[serde(default)]
    interactions: Vec<InteractionRecord>,

    #[serde(rename = "subsystem_activity", default)]
    activity: BTreeMap<Subsystem, u64>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            metadata: LedgerMetadata::default(),
            interactions: Vec::new(),
            activity: seeded_activity(),
        }
    }

    /// Append a record, then evict the oldest records beyond `max_records`.
    ///
    /// Returns the evicted records, oldest first.
    pub fn push(&mut self, record: InteractionRecord, max_records: usize) -> Vec<InteractionRecord> {
        *self.activity.entry(record.subsystem).or_insert(0) += 1;
        self.interactions.push(record);

        let max_records = max_records.max(1);
        if self.interactions.len() <= max_records {
            return Vec::new();
        }

        let excess = self.interactions.len() - max_records;
        let evicted: Vec<InteractionRecord> = self.interactions.drain(..excess).collect();
        for record in &evicted {
            if let Some(count) = self.activity.get_mut(&record.subsystem) {
                *count = count.saturating_sub(1);
            }
        }
        evicted
    }

    /// Rebuild the activity counts from the interactions.
    pub fn recompute_activity(&mut self) {
        let mut activity = seeded_activity();
        for record in &self.interactions {
            *activity.entry(record.subsystem).or_insert(0) += 1;
        }
        self.activity = activity;
    }

    /// Whether the stored counts match the interactions.
    pub fn is_consistent(&self) -> bool {
        let mut tally: BTreeMap<Subsystem, u64> = BTreeMap::new();
        for record in &self.interactions {
            *tally.entry(record.subsystem).or_insert(0) += 1;
        }

        self.activity
            .iter()
            .all(|(subsystem, count)| tally.get(subsystem).copied().unwrap_or(0) == *count)
            && tally
                .iter()
                .all(|(subsystem, count)| self.activity.get(subsystem) == Some(count))
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> &[InteractionRecord] {
        let start = self.interactions.len().saturating_sub(n);
        &self.interactions[start..]
    }

    pub fn interactions(&self) -> &[InteractionRecord] {
        &self.interactions
    }

    pub fn activity(&self) -> &BTreeMap<Subsystem, u64> {
        &self.activity
    }

    /// Records attributed to a subsystem.
    pub fn count(&self, subsystem: Subsystem) -> u64 {
        self.activity.get(&subsystem).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Number of distinct sessions in the ledger.
    pub fn unique_sessions(&self) -> usize {
        self.interactions
            .iter()
            .map(|r| &r.session_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Subsystem sequence per calendar day (UTC) for records at or after `since`.
    pub fn daily_patterns(&self, since: DateTime<Utc>) -> BTreeMap<NaiveDate, Vec<Subsystem>> {
        let mut patterns: BTreeMap<NaiveDate, Vec<Subsystem>> = BTreeMap::new();
        for record in self.interactions.iter().filter(|r| r.timestamp >= since) {
            patterns
                .entry(record.timestamp.date_naive())
                .or_default()
                .push(record.subsystem);
        }
        patterns
    }
}

fn seeded_activity() -> BTreeMap<Subsystem, u64> {
    Subsystem::ARCHETYPAL.iter().map(|s| (*s, 0)).collect()
}

/// The subsystem with the highest count, ties broken by routing priority.
///
/// `None` when every count is zero.
pub fn dominant<V>(counts: &BTreeMap<Subsystem, V>) -> Option<Subsystem>
where
    V: Copy + PartialOrd + Default,
{
    let zero = V::default();
    let mut best: Option<(Subsystem, V)> = None;

    for (subsystem, value) in counts {
        if *value <= zero {
            continue;
        }
        best = match best {
            None => Some((*subsystem, *value)),
            Some((current, top)) => {
                if *value > top || (*value == top && subsystem.priority() < current.priority()) {
                    Some((*subsystem, *value))
                } else {
                    Some((current, top))
                }
            }
        };
    }

    best.map(|(subsystem, _)| subsystem)
}
