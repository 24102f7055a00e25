//! Drift Analyzer - compares recent subsystem usage with the full history.
//!
//! The analysis works as follows:
//! 1. **Distributions**: subsystem fractions over the last N records and over all records
//! 2. **Deltas**: per-subsystem absolute difference between the two
//! 3. **State**: `Shifted` when the largest delta exceeds the threshold, else `Stable`;
//!    an empty ledger is `Silence`
//! 4. **Narrative**: a fixed phrase looked up from the state and the recent dominant subsystem

pub mod narrative;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use sylva_catalog::Subsystem;

use crate::error::StoreError;
use crate::memory::{dominant, InteractionRecord, MemoryStore};

/// Configuration for drift detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Number of most recent records forming the recent window.
    pub recent_window: usize,

    /// Largest per-subsystem delta still considered stable.
    pub shift_threshold: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            recent_window: 5,
            shift_threshold: 0.25,
        }
    }
}

/// Qualitative label of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftState {
    /// No history at all.
    Silence,
    Stable,
    Shifted,
}

/// Subsystem counts over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    counts: BTreeMap<Subsystem, u64>,
    total: u64,
}

impl Distribution {
    pub fn from_records(records: &[InteractionRecord]) -> Self {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.subsystem).or_insert(0) += 1;
        }
        Self {
            counts,
            total: records.len() as u64,
        }
    }

    /// Share of records attributed to `subsystem` (0 for an empty distribution).
    pub fn fraction(&self, subsystem: Subsystem) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(subsystem) as f64 / self.total as f64
    }

    pub fn count(&self, subsystem: Subsystem) -> u64 {
        self.counts.get(&subsystem).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Most frequent subsystem, ties broken by routing priority.
    pub fn dominant(&self) -> Option<Subsystem> {
        dominant(&self.counts)
    }

    /// Fraction per subsystem, for every subsystem.
    pub fn fractions(&self) -> BTreeMap<Subsystem, f64> {
        Subsystem::ALL
            .iter()
            .map(|s| (*s, self.fraction(*s)))
            .collect()
    }
}

/// Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftSnapshot {
    pub state: DriftState,
    pub recent: Distribution,
    pub history: Distribution,

    /// |recent - history| per subsystem.
    pub deltas: BTreeMap<Subsystem, f64>,
    pub max_delta: f64,

    pub dominant: Option<Subsystem>,
    pub recent_dominant: Option<Subsystem>,
    pub narrative: String,
}

impl DriftSnapshot {
    /// The defined snapshot of an empty ledger.
    pub fn silence() -> Self {
        Self {
            state: DriftState::Silence,
            recent: Distribution::default(),
            history: Distribution::default(),
            deltas: BTreeMap::new(),
            max_delta: 0.0,
            dominant: None,
            recent_dominant: None,
            narrative: narrative::SILENCE.to_string(),
        }
    }

    pub fn is_shifted(&self) -> bool {
        self.state == DriftState::Shifted
    }

    pub fn delta(&self, subsystem: Subsystem) -> f64 {
        self.deltas.get(&subsystem).copied().unwrap_or(0.0)
    }
}

/// Computes drift snapshots from ledger records.
#[derive(Debug, Clone, Default)]
pub struct DriftAnalyzer {
    config: DriftConfig,
}

impl DriftAnalyzer {
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Analyze chronological records with an explicit recent window size.
    pub fn analyze(&self, records: &[InteractionRecord], recent_window: usize) -> DriftSnapshot {
        if records.is_empty() {
            return DriftSnapshot::silence();
        }

        let window = recent_window.max(1).min(records.len());
        let recent = Distribution::from_records(&records[records.len() - window..]);
        let history = Distribution::from_records(records);

        let deltas: BTreeMap<Subsystem, f64> = Subsystem::ALL
            .iter()
            .map(|s| (*s, (recent.fraction(*s) - history.fraction(*s)).abs()))
            .collect();
        let max_delta = deltas.values().copied().fold(0.0, f64::max);

        let state = if max_delta > self.config.shift_threshold {
            DriftState::Shifted
        } else {
            DriftState::Stable
        };

        let recent_dominant = recent.dominant();
        log::debug!(
            "drift over {} of {} records: {:?} (max delta {:.3})",
            window,
            records.len(),
            state,
            max_delta
        );

        DriftSnapshot {
            state,
            dominant: history.dominant(),
            recent_dominant,
            narrative: narrative::compose(state, recent_dominant),
            recent,
            history,
            deltas,
            max_delta,
        }
    }

    /// Analyze with the configured recent window.
    pub fn analyze_default(&self, records: &[InteractionRecord]) -> DriftSnapshot {
        self.analyze(records, self.config.recent_window)
    }

    /// Analyze the store's current ledger with the configured window.
    pub fn analyze_store(&self, store: &mut MemoryStore) -> Result<DriftSnapshot, StoreError> {
        let ledger = store.ledger()?;
        Ok(self.analyze_default(ledger.interactions()))
    }
}
