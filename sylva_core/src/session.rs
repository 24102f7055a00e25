//! Session facade - one user turn in, one contained response out.
//!
//! [`Sylva`] owns the router, generator, analyzer, memory store and the
//! seeded random source. Per-turn failures are logged and answered with a
//! fallback phrase; they never reach the caller.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use sylva_catalog::{ArchetypeId, MetaphorCatalog, Subsystem};

use crate::config::SylvaConfig;
use crate::drift::{narrative, DriftAnalyzer, DriftSnapshot};
use crate::error::{StoreError, SylvaError};
use crate::generator::{GeneratedResponse, ResponseGenerator, Screening};
use crate::memory::{InteractionRecord, MemoryStats, MemoryStore, SessionId, StoreCorruptionWarning};
use crate::router::{RouteReport, SubsystemRouter};

/// Answer to empty input. Not recorded.
pub const SILENCE_RESPONSE: &str = "The silence is welcome here too.";

const QUIET_RESPONSE: &str = "We'll sit in stillness. You're not required to speak.";
const EMPTY_MIRROR_RESPONSE: &str = "The mirror reflects emptiness, and that too has meaning.";
const UNKNOWN_RITUAL_RESPONSE: &str = "That rite is not known here. The silence still holds.";

/// Slash commands handled without routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RitualCommand {
    /// `/quiet`
    Quiet,
    /// `/pulse`
    Pulse,
    /// `/mirror <text>`
    Mirror(String),
    /// Any other `/word`.
    Unknown(String),
}

impl RitualCommand {
    /// Parse a slash command. `None` if the text is not one.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let (name, rest) = match text.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (text, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "/quiet" => RitualCommand::Quiet,
            "/pulse" => RitualCommand::Pulse,
            "/mirror" => RitualCommand::Mirror(rest.to_string()),
            _ => RitualCommand::Unknown(name.to_string()),
        };
        Some(command)
    }

    /// Subsystem a ritual answers as.
    pub fn subsystem(&self) -> Subsystem {
        match self {
            RitualCommand::Quiet | RitualCommand::Mirror(_) => Subsystem::Aura,
            RitualCommand::Pulse => Subsystem::Root,
            RitualCommand::Unknown(_) => Subsystem::Neutral,
        }
    }
}

/// Everything the caller needs to show for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Never empty.
    pub response: String,
    pub subsystem: Subsystem,
    pub archetype_id: ArchetypeId,

    /// Whether the turn was written to memory.
    pub recorded: bool,

    /// Store corruption noticed during the turn.
    pub warnings: Vec<StoreCorruptionWarning>,
}

/// A running SYLVA session.
#[derive(Debug)]
pub struct Sylva {
    router: SubsystemRouter,
    generator: ResponseGenerator,
    analyzer: DriftAnalyzer,
    store: MemoryStore,
    rng: ChaCha8Rng,
}

impl Sylva {
    /// Start a session over a catalog. Catalog problems abort here.
    pub fn new(catalog: MetaphorCatalog, config: SylvaConfig) -> Result<Self, SylvaError> {
        catalog.validate()?;
        let catalog = Arc::new(catalog);

        let router = SubsystemRouter::from_catalog(&catalog)?;
        let generator = ResponseGenerator::new(Arc::clone(&catalog), config.generator)?;
        let analyzer = DriftAnalyzer::new(config.drift);
        let store = MemoryStore::open(config.memory)?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        log::info!(
            "session {} started with {} archetypes",
            store.session_id(),
            catalog.list_archetypes().len()
        );

        Ok(Self {
            router,
            generator,
            analyzer,
            store,
            rng,
        })
    }

    /// Start a session with the configured catalog, or the built-in one.
    pub fn from_config(config: SylvaConfig) -> Result<Self, SylvaError> {
        let catalog = match &config.catalog_path {
            Some(path) => MetaphorCatalog::load(path)?,
            None => MetaphorCatalog::builtin()?,
        };
        Self::new(catalog, config)
    }

    /// Answer one turn of user text.
    pub fn respond(&mut self, input: &str) -> TurnOutcome {
        let text = input.trim();
        if text.is_empty() {
            return TurnOutcome {
                response: SILENCE_RESPONSE.to_string(),
                subsystem: Subsystem::Neutral,
                archetype_id: ArchetypeId::universal(),
                recorded: false,
                warnings: self.store.take_warnings(),
            };
        }

        if !self.router.is_crisis(text) {
            if let Some(command) = RitualCommand::parse(text) {
                return self.ritual(command, text);
            }
        }

        let generated = match self.router.route(text) {
            Ok(subsystem) => match self.generator.generate(subsystem, text, &mut self.rng) {
                Ok(generated) => generated,
                Err(e) => {
                    log::warn!("generation failed for {}: {}", subsystem, e);
                    self.generator.fallback(subsystem, &mut self.rng)
                }
            },
            Err(e) => {
                log::warn!("routing failed: {}", e);
                self.generator.fallback(Subsystem::Neutral, &mut self.rng)
            }
        };

        self.finish(text, generated)
    }

    /// Run a ritual command. The turn is recorded unless the command is unknown.
    ///
    /// Fixed ritual phrases are pre-vetted. A mirror that echoes user words
    /// goes through the safety filter like generated text.
    pub fn ritual(&mut self, command: RitualCommand, input: &str) -> TurnOutcome {
        let subsystem = command.subsystem();
        let (response, screening) = match &command {
            RitualCommand::Quiet => (QUIET_RESPONSE.to_string(), Screening::Bypassed),
            RitualCommand::Pulse => match self.pulse() {
                Ok(snapshot) => (snapshot.narrative, Screening::Bypassed),
                Err(e) => {
                    log::warn!("pulse could not read memory: {}", e);
                    (narrative::SILENCE.to_string(), Screening::Bypassed)
                }
            },
            RitualCommand::Mirror(words) if words.is_empty() => {
                (EMPTY_MIRROR_RESPONSE.to_string(), Screening::Bypassed)
            }
            RitualCommand::Mirror(words) => {
                let reflection =
                    format!("The mirror shows: '{}'. These words carry their own weight.", words);
                let screened = self.generator.filter().screen(reflection, &mut self.rng);
                (screened.text, screened.screening)
            }
            RitualCommand::Unknown(name) => {
                log::debug!("unknown ritual {}", name);
                return TurnOutcome {
                    response: UNKNOWN_RITUAL_RESPONSE.to_string(),
                    subsystem,
                    archetype_id: ArchetypeId::ritual(),
                    recorded: false,
                    warnings: self.store.take_warnings(),
                };
            }
        };

        self.finish(
            input,
            GeneratedResponse {
                text: response,
                archetype_id: ArchetypeId::ritual(),
                subsystem,
                screening,
            },
        )
    }

    /// Record a turn and package it for the caller.
    fn finish(&mut self, input: &str, generated: GeneratedResponse) -> TurnOutcome {
        let recorded = match self.store.record(
            input,
            &generated.text,
            generated.subsystem,
            generated.archetype_id.clone(),
        ) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("interaction not recorded: {}", e);
                false
            }
        };

        TurnOutcome {
            response: generated.text,
            subsystem: generated.subsystem,
            archetype_id: generated.archetype_id,
            recorded,
            warnings: self.store.take_warnings(),
        }
    }

    /// Route without generating, with the scores behind the decision.
    pub fn explain(&self, text: &str) -> Result<RouteReport, SylvaError> {
        self.router.explain(text)
    }

    /// Drift snapshot of the current ledger.
    pub fn pulse(&mut self) -> Result<DriftSnapshot, StoreError> {
        self.analyzer.analyze_store(&mut self.store)
    }

    pub fn read_recent(&mut self, n: usize) -> Result<Vec<InteractionRecord>, StoreError> {
        self.store.read_recent(n)
    }

    pub fn activity_counts(&mut self) -> Result<BTreeMap<Subsystem, u64>, StoreError> {
        self.store.activity_counts()
    }

    pub fn stats(&mut self) -> Result<MemoryStats, StoreError> {
        self.store.stats()
    }

    pub fn daily_patterns(
        &mut self,
        days: u32,
    ) -> Result<BTreeMap<chrono::NaiveDate, Vec<Subsystem>>, StoreError> {
        self.store.daily_patterns(days)
    }

    pub fn export(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.store.export(path)
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear()
    }

    pub fn session_id(&self) -> &SessionId {
        self.store.session_id()
    }

    pub fn catalog(&self) -> &MetaphorCatalog {
        self.generator.catalog()
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}
