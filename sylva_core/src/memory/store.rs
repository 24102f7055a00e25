//! File-backed memory store.
//!
//! The ledger and its activity counts live in one JSON document. Every
//! mutation rewrites that document through a temporary file and a rename,
//! so a crash leaves either the old or the new ledger. Each access holds an
//! advisory lock on a sidecar `<file>.lock` so separate processes sharing
//! the ledger do not lose each other's updates.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use sylva_catalog::{ArchetypeId, Subsystem};
use thiserror::Error;

use super::ledger::{dominant, Ledger};
use super::record::{InteractionRecord, SessionId};
use crate::error::StoreError;

/// Configuration for the memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Ledger file.
    pub path: PathBuf,

    /// Retention ceiling. Oldest records are evicted beyond it.
    pub max_records: usize,

    /// Records returned by [`MemoryStore::recent`].
    pub recent_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("memory/user_log.json"),
            max_records: 1000,
            recent_limit: 10,
        }
    }
}

impl MemoryConfig {
    /// Config for a ledger at `path` with default limits.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }
}

/// A ledger that could not be read was replaced with an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ledger at {path} was unreadable ({reason}); continuing with an empty ledger")]
pub struct StoreCorruptionWarning {
    pub path: PathBuf,

    /// Where the unreadable file was moved, if the move succeeded.
    pub quarantined: Option<PathBuf>,

    pub reason: String,
}

/// Summary of the ledger's contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_interactions: usize,
    pub unique_sessions: usize,
    pub subsystem_activity: BTreeMap<Subsystem, u64>,
    pub most_active_subsystem: Option<Subsystem>,
    pub file_size: u64,
    pub created: DateTime<Utc>,
    pub version: String,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    #[serde(flatten)]
    ledger: &'a Ledger,
    export_metadata: ExportMetadata<'a>,
}

#[derive(Serialize)]
struct ExportMetadata<'a> {
    exported_at: DateTime<Utc>,
    total_interactions: usize,
    subsystem_activity: &'a BTreeMap<Subsystem, u64>,
    export_note: &'static str,
}

/// Held for the duration of one ledger access. Released on drop.
struct LedgerLock {
    _file: File,
}

impl LedgerLock {
    fn exclusive(path: &Path) -> Result<Self, StoreError> {
        let file = Self::open(path)?;
        file.lock().map_err(StoreError::io(path))?;
        Ok(Self { _file: file })
    }

    fn shared(path: &Path) -> Result<Self, StoreError> {
        let file = Self::open(path)?;
        file.lock_shared().map_err(StoreError::io(path))?;
        Ok(Self { _file: file })
    }

    fn open(path: &Path) -> Result<File, StoreError> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(StoreError::io(path))
    }
}

enum LedgerRead {
    Missing,
    Loaded(Ledger),
    Corrupt(String),
}

/// Append-only interaction memory persisted to a JSON file.
#[derive(Debug)]
pub struct MemoryStore {
    config: MemoryConfig,
    lock_path: PathBuf,
    session_id: SessionId,
    warnings: Vec<StoreCorruptionWarning>,
}

impl MemoryStore {
    /// Open (or create) the ledger at the configured path.
    ///
    /// A corrupted ledger is quarantined and replaced; see [`Self::take_warnings`].
    pub fn open(config: MemoryConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
        }

        let mut store = Self {
            lock_path: sidecar(&config.path, ".lock"),
            config,
            session_id: SessionId::new(),
            warnings: Vec::new(),
        };

        {
            let _lock = LedgerLock::exclusive(&store.lock_path)?;
            if !store.config.path.exists() {
                store.write(&Ledger::new())?;
                log::info!("initialized memory ledger at {}", store.config.path.display());
            } else {
                store.load_or_recover()?;
            }
        }

        Ok(store)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Session id stamped on records created through [`Self::record`].
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Append one record.
    pub fn append(&mut self, record: InteractionRecord) -> Result<(), StoreError> {
        self.append_all(std::iter::once(record))
    }

    /// Append several records in one write.
    pub fn append_all(
        &mut self,
        records: impl IntoIterator<Item = InteractionRecord>,
    ) -> Result<(), StoreError> {
        let _lock = LedgerLock::exclusive(&self.lock_path)?;
        let mut ledger = self.load_or_recover()?;

        let mut evicted = 0;
        for record in records {
            evicted += ledger.push(record, self.config.max_records).len();
        }
        if evicted > 0 {
            log::debug!("evicted {} oldest interaction(s)", evicted);
        }

        self.write(&ledger)
    }

    /// Build a record for this session and append it.
    pub fn record(
        &mut self,
        input: &str,
        response: &str,
        subsystem: Subsystem,
        archetype_id: ArchetypeId,
    ) -> Result<InteractionRecord, StoreError> {
        let record = InteractionRecord::new(
            self.session_id.clone(),
            input,
            response,
            subsystem,
            archetype_id,
        );
        self.append(record.clone())?;
        Ok(record)
    }

    /// The last `n` records, oldest first.
    pub fn read_recent(&mut self, n: usize) -> Result<Vec<InteractionRecord>, StoreError> {
        Ok(self.ledger()?.recent(n).to_vec())
    }

    /// The last `recent_limit` records, oldest first.
    pub fn recent(&mut self) -> Result<Vec<InteractionRecord>, StoreError> {
        self.read_recent(self.config.recent_limit)
    }

    /// Records per subsystem currently in the ledger.
    pub fn activity_counts(&mut self) -> Result<BTreeMap<Subsystem, u64>, StoreError> {
        Ok(self.ledger()?.activity().clone())
    }

    pub fn len(&mut self) -> Result<usize, StoreError> {
        Ok(self.ledger()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, StoreError> {
        Ok(self.ledger()?.is_empty())
    }

    /// A consistent snapshot of the whole ledger.
    pub fn ledger(&mut self) -> Result<Ledger, StoreError> {
        {
            let _lock = LedgerLock::shared(&self.lock_path)?;
            match self.read_ledger() {
                LedgerRead::Loaded(ledger) => return Ok(ledger),
                LedgerRead::Missing => return Ok(Ledger::new()),
                LedgerRead::Corrupt(_) => {}
            }
        }

        // Recovery writes, so it needs the exclusive lock.
        let _lock = LedgerLock::exclusive(&self.lock_path)?;
        self.load_or_recover()
    }

    /// Empty the ledger.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let _lock = LedgerLock::exclusive(&self.lock_path)?;
        let mut ledger = Ledger::new();
        ledger.metadata.description.push_str(" (cleared)");
        self.write(&ledger)?;
        log::info!("memory ledger cleared");
        Ok(())
    }

    pub fn stats(&mut self) -> Result<MemoryStats, StoreError> {
        let ledger = self.ledger()?;
        let file_size = fs::metadata(&self.config.path).map(|m| m.len()).unwrap_or(0);

        Ok(MemoryStats {
            total_interactions: ledger.len(),
            unique_sessions: ledger.unique_sessions(),
            most_active_subsystem: dominant(ledger.activity()),
            subsystem_activity: ledger.activity().clone(),
            file_size,
            created: ledger.metadata.created,
            version: ledger.metadata.version.clone(),
        })
    }

    /// Subsystem sequence per day, from the start of the day `days` days ago (UTC).
    pub fn daily_patterns(&mut self, days: u32) -> Result<BTreeMap<NaiveDate, Vec<Subsystem>>, StoreError> {
        let since = Utc::now()
            .date_naive()
            .checked_sub_signed(Duration::days(i64::from(days)))
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(self.ledger()?.daily_patterns(since))
    }

    /// Write a copy of the ledger with an export metadata block.
    pub fn export(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let ledger = self.ledger()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
        }

        let document = ExportDocument {
            ledger: &ledger,
            export_metadata: ExportMetadata {
                exported_at: Utc::now(),
                total_interactions: ledger.len(),
                subsystem_activity: ledger.activity(),
                export_note: "SYLVA symbolic interaction memory export",
            },
        };

        let bytes = serde_json::to_vec_pretty(&document)?;
        fs::write(path, bytes).map_err(StoreError::io(path))?;
        log::info!("memory exported to {}", path.display());
        Ok(())
    }

    /// Corruption notices collected since the last call.
    pub fn take_warnings(&mut self) -> Vec<StoreCorruptionWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn read_ledger(&self) -> LedgerRead {
        let bytes = match fs::read(&self.config.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return LedgerRead::Missing,
            Err(e) => return LedgerRead::Corrupt(e.to_string()),
        };

        match serde_json::from_slice::<Ledger>(&bytes) {
            Ok(mut ledger) => {
                ledger.recompute_activity();
                LedgerRead::Loaded(ledger)
            }
            Err(e) => LedgerRead::Corrupt(e.to_string()),
        }
    }

    /// Caller must hold the exclusive lock.
    fn load_or_recover(&mut self) -> Result<Ledger, StoreError> {
        match self.read_ledger() {
            LedgerRead::Loaded(ledger) => Ok(ledger),
            LedgerRead::Missing => Ok(Ledger::new()),
            LedgerRead::Corrupt(reason) => {
                let warning = self.quarantine(reason);
                log::warn!("{}", warning);
                self.warnings.push(warning);

                let ledger = Ledger::new();
                self.write(&ledger)?;
                log::info!("memory ledger reset at {}", self.config.path.display());
                Ok(ledger)
            }
        }
    }

    fn quarantine(&self, reason: String) -> StoreCorruptionWarning {
        let target = quarantine_target(&self.config.path, Utc::now().timestamp());
        let quarantined = match fs::rename(&self.config.path, &target) {
            Ok(()) => Some(target),
            Err(e) => {
                log::warn!("could not move unreadable ledger aside: {}", e);
                None
            }
        };

        StoreCorruptionWarning {
            path: self.config.path.clone(),
            quarantined,
            reason,
        }
    }

    /// Caller must hold the exclusive lock.
    fn write(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let tmp = sidecar(&self.config.path, ".tmp");
        let bytes = serde_json::to_vec_pretty(ledger)?;

        let mut file = File::create(&tmp).map_err(StoreError::io(&tmp))?;
        file.write_all(&bytes).map_err(StoreError::io(&tmp))?;
        file.sync_all().map_err(StoreError::io(&tmp))?;
        drop(file);

        fs::rename(&tmp, &self.config.path).map_err(StoreError::io(&self.config.path))
    }
}

/// `path` with `suffix` appended to its file name.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `<file>.corrupt-<unix secs>`, with a counter if that name is taken.
fn quarantine_target(path: &Path, unix_secs: i64) -> PathBuf {
    let base = format!(".corrupt-{}", unix_secs);
    let mut target = sidecar(path, &base);
    let mut n = 1;
    while target.exists() {
        target = sidecar(path, &format!("{}-{}", base, n));
        n += 1;
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir, max_records: usize) -> MemoryStore {
        let config = MemoryConfig::at(dir.path().join("memory").join("user_log.json"))
            .with_max_records(max_records);
        MemoryStore::open(config).unwrap()
    }

    fn record(subsystem: Subsystem, input: &str) -> InteractionRecord {
        InteractionRecord::new(
            SessionId::unknown(),
            input,
            "The container holds what is here.",
            subsystem,
            ArchetypeId::universal(),
        )
    }

    #[test]
    fn test_open_creates_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 10);

        assert!(store.path().exists());
        assert_eq!(store.len().unwrap(), 0);
        let counts = store.activity_counts().unwrap();
        assert_eq!(counts.get(&Subsystem::Marrow), Some(&0));
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn test_append_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(&dir, 10);
            store.record("hollow", "The bone holds.", Subsystem::Marrow, ArchetypeId::new("the_bone"))
                .unwrap();
        }

        let mut store = open(&dir, 10);
        let recent = store.read_recent(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].input, "hollow");
        assert_eq!(recent[0].archetype_id.as_str(), "the_bone");
        assert_eq!(store.activity_counts().unwrap()[&Subsystem::Marrow], 1);
    }

    #[test]
    fn test_read_recent_is_chronological() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 10);
        for input in ["a", "b", "c"] {
            store.append(record(Subsystem::Root, input)).unwrap();
        }

        let inputs: Vec<String> = store.read_recent(2).unwrap().into_iter().map(|r| r.input).collect();
        assert_eq!(inputs, vec!["b", "c"]);
    }

    #[test]
    fn test_eviction_updates_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 3);
        store.append(record(Subsystem::Marrow, "oldest")).unwrap();
        store
            .append_all((0..3).map(|i| record(Subsystem::Aura, &format!("aura {}", i))))
            .unwrap();

        let ledger = store.ledger().unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.count(Subsystem::Marrow), 0);
        assert_eq!(ledger.count(Subsystem::Aura), 3);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn test_corrupt_ledger_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_log.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = MemoryStore::open(MemoryConfig::at(&path)).unwrap();
        let warnings = store.take_warnings();

        assert_eq!(warnings.len(), 1);
        let quarantined = warnings[0].quarantined.clone().unwrap();
        let name = quarantined.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("user_log.json.corrupt-"), "{}", name);
        assert_eq!(fs::read_to_string(&quarantined).unwrap(), "{ not json");
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn test_repeated_corruption_keeps_every_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_log.json");
        fs::write(&path, "first").unwrap();
        let mut store = MemoryStore::open(MemoryConfig::at(&path)).unwrap();

        fs::write(&path, "second").unwrap();
        store.append(record(Subsystem::Root, "a")).unwrap();

        let quarantined: Vec<PathBuf> = store
            .take_warnings()
            .into_iter()
            .filter_map(|w| w.quarantined)
            .collect();
        assert_eq!(quarantined.len(), 2);
        assert_ne!(quarantined[0], quarantined[1]);
        assert_eq!(fs::read_to_string(&quarantined[0]).unwrap(), "first");
        assert_eq!(fs::read_to_string(&quarantined[1]).unwrap(), "second");
    }

    #[test]
    fn test_quarantine_target_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_log.json");

        let first = quarantine_target(&path, 1_700_000_000);
        assert_eq!(first, dir.path().join("user_log.json.corrupt-1700000000"));

        fs::write(&first, "taken").unwrap();
        let second = quarantine_target(&path, 1_700_000_000);
        assert_eq!(second, dir.path().join("user_log.json.corrupt-1700000000-1"));
    }

    #[test]
    fn test_two_handles_share_one_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_log.json");
        let mut first = MemoryStore::open(MemoryConfig::at(&path)).unwrap();
        let mut second = MemoryStore::open(MemoryConfig::at(&path)).unwrap();

        for n in 0..10 {
            let input = format!("first {}", n);
            first
                .record(&input, "The bone holds.", Subsystem::Marrow, ArchetypeId::universal())
                .unwrap();
            let input = format!("second {}", n);
            second
                .record(&input, "The root holds.", Subsystem::Root, ArchetypeId::universal())
                .unwrap();
        }

        assert_eq!(first.len().unwrap(), 20);
        assert_eq!(second.len().unwrap(), 20);

        let ledger = second.ledger().unwrap();
        assert!(ledger.is_consistent());
        assert_eq!(ledger.count(Subsystem::Marrow), 10);
        assert_eq!(ledger.count(Subsystem::Root), 10);
        assert_eq!(ledger.unique_sessions(), 2);
        assert_eq!(ledger.interactions()[1].input, "second 0");
    }

    #[test]
    fn test_concurrent_writers_lose_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_log.json");
        MemoryStore::open(MemoryConfig::at(&path)).unwrap();

        let writers: Vec<_> = [Subsystem::Marrow, Subsystem::Aura]
            .into_iter()
            .map(|subsystem| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut store = MemoryStore::open(MemoryConfig::at(path)).unwrap();
                    for n in 0..10 {
                        store.append(record(subsystem, &format!("{} {}", subsystem, n))).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let mut store = MemoryStore::open(MemoryConfig::at(&path)).unwrap();
        let ledger = store.ledger().unwrap();
        assert_eq!(ledger.len(), 20);
        assert!(ledger.is_consistent());
        assert_eq!(ledger.count(Subsystem::Marrow), 10);
        assert_eq!(ledger.count(Subsystem::Aura), 10);
    }

    #[test]
    fn test_corruption_after_open_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 10);
        store.append(record(Subsystem::Root, "a")).unwrap();

        fs::write(store.path(), "null").unwrap();
        store.append(record(Subsystem::Aura, "b")).unwrap();

        assert_eq!(store.take_warnings().len(), 1);
        let ledger = store.ledger().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.count(Subsystem::Aura), 1);
        assert_eq!(ledger.count(Subsystem::Root), 0);
    }

    #[test]
    fn test_stored_counts_are_not_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_log.json");
        fs::write(
            &path,
            r#"{
                "metadata": {"created": "2024-01-01T00:00:00", "version": "2.0"},
                "interactions": [
                    {"timestamp": "2024-01-01T10:00:00", "user_input": "x", "sylva_response": "y",
                     "subsystem": "ROOT", "session_id": "20240101", "interaction_id": "20240101_100000_0"}
                ],
                "subsystem_activity": {"MARROW": 4, "ROOT": 0, "AURA": 0}
            }"#,
        )
        .unwrap();

        let mut store = MemoryStore::open(MemoryConfig::at(&path)).unwrap();
        let counts = store.activity_counts().unwrap();
        assert_eq!(counts[&Subsystem::Root], 1);
        assert_eq!(counts[&Subsystem::Marrow], 0);
        assert_eq!(store.stats().unwrap().version, "2.0");
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 10);
        store.append(record(Subsystem::Root, "a")).unwrap();
        store.clear().unwrap();

        assert!(store.is_empty().unwrap());
        assert!(store.ledger().unwrap().metadata.description.ends_with("(cleared)"));
    }

    #[test]
    fn test_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 10);
        store.record("a", "b", Subsystem::Aura, ArchetypeId::universal()).unwrap();
        store.record("a", "b", Subsystem::Aura, ArchetypeId::universal()).unwrap();
        store.append(record(Subsystem::Root, "c")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_interactions, 3);
        assert_eq!(stats.unique_sessions, 2);
        assert_eq!(stats.most_active_subsystem, Some(Subsystem::Aura));
        assert!(stats.file_size > 0);
    }

    #[test]
    fn test_daily_patterns_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 10);
        store
            .append(record(Subsystem::Marrow, "old").with_timestamp(Utc::now() - Duration::days(40)))
            .unwrap();
        store.append(record(Subsystem::Root, "now")).unwrap();

        let patterns = store.daily_patterns(7).unwrap();
        assert_eq!(patterns.values().flatten().collect::<Vec<_>>(), vec![&Subsystem::Root]);
    }

    #[test]
    fn test_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir, 10);
        store.append(record(Subsystem::Root, "a")).unwrap();

        let target = dir.path().join("exports").join("memory.json");
        store.export(&target).unwrap();

        let exported: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(exported["export_metadata"]["total_interactions"], 1);
        assert_eq!(exported["interactions"].as_array().unwrap().len(), 1);
        assert_eq!(exported["subsystem_activity"]["ROOT"], 1);
    }
}
