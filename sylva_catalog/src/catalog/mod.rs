//! Metaphor Catalog - the immutable table SYLVA answers from.
//!
//! The catalog holds:
//! - **Profiles**: description, routing keywords and echo phrase per subsystem
//! - **Archetypes**: symbolic template bundles, each owned by one subsystem
//! - **Pools**: universal responses, ritual closures, crisis protocol, safety patterns
//!
//! It is loaded once at startup (from the built-in data or a JSON/TOML file)
//! and passed by reference to everything that needs it.

mod document;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{Archetype, ArchetypeId, CatalogError, Subsystem, SubsystemProfile};
use document::CatalogDocument;

const BUILTIN_CATALOG: &str = include_str!("../../data/metaphors.json");

/// Crisis detection patterns and the fixed, pre-vetted response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrisisProtocol {
    /// Case-insensitive regular expressions.
    pub patterns: Vec<String>,
    pub response: String,
}

/// Pattern lists consumed by the safety filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyPatterns {
    /// Advice, directive, clinical or reassurance language.
    pub forbidden: Vec<String>,
    /// Containment, holding or depth language; at least one must match.
    pub required: Vec<String>,
    /// Pre-approved replacements.
    pub fallbacks: Vec<String>,
}

/// The complete static catalog.
#[derive(Debug, Clone, Default)]
pub struct MetaphorCatalog {
    profiles: BTreeMap<Subsystem, SubsystemProfile>,
    archetypes: BTreeMap<ArchetypeId, Archetype>,
    universal_responses: Vec<String>,
    ritual_closures: Vec<String>,
    crisis: CrisisProtocol,
    safety: SafetyPatterns,
}

impl MetaphorCatalog {
    /// Create an empty catalog. Use the `with_*` builders, then [`validate`](Self::validate).
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    /// Parse and validate a JSON catalog document.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        document.try_into()
    }

    /// Parse and validate a TOML catalog document.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = toml::from_str(text)?;
        document.try_into()
    }

    /// Load a catalog file, choosing the format by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            other => Err(CatalogError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Add or replace a subsystem profile.
    pub fn with_profile(mut self, profile: SubsystemProfile) -> Self {
        self.profiles.insert(profile.subsystem, profile);
        self
    }

    /// Add or replace an archetype.
    pub fn with_archetype(mut self, archetype: Archetype) -> Self {
        self.archetypes.insert(archetype.id.clone(), archetype);
        self
    }

    pub fn with_universal_response(mut self, response: impl Into<String>) -> Self {
        self.universal_responses.push(response.into());
        self
    }

    pub fn with_ritual_closure(mut self, closure: impl Into<String>) -> Self {
        self.ritual_closures.push(closure.into());
        self
    }

    pub fn with_crisis(mut self, crisis: CrisisProtocol) -> Self {
        self.crisis = crisis;
        self
    }

    pub fn with_safety(mut self, safety: SafetyPatterns) -> Self {
        self.safety = safety;
        self
    }

    /// Check the structural rules every loaded catalog must satisfy.
    ///
    /// Regular expressions are compiled (and rejected) by their consumers.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for subsystem in Subsystem::ARCHETYPAL {
            if !self.profiles.contains_key(&subsystem) {
                return Err(CatalogError::MissingProfile(subsystem));
            }
        }

        for archetype in self.archetypes.values() {
            if !archetype.subsystem.is_archetypal() {
                return Err(CatalogError::PseudoSubsystem {
                    archetype: archetype.id.to_string(),
                    subsystem: archetype.subsystem,
                });
            }
            if !archetype.has_responses() {
                return Err(CatalogError::EmptyResponses(archetype.id.to_string()));
            }
        }

        if !has_text(&self.universal_responses) {
            return Err(CatalogError::EmptyPool("universal_responses"));
        }
        if !has_text(&self.safety.fallbacks) {
            return Err(CatalogError::EmptyPool("safety.fallbacks"));
        }
        if self.crisis.response.trim().is_empty() {
            return Err(CatalogError::EmptyPool("crisis.response"));
        }

        Ok(())
    }

    /// Profile of an archetypal subsystem.
    pub fn profile(&self, subsystem: Subsystem) -> Option<&SubsystemProfile> {
        self.profiles.get(&subsystem)
    }

    /// All profiles, in subsystem order.
    pub fn profiles(&self) -> impl Iterator<Item = &SubsystemProfile> {
        self.profiles.values()
    }

    /// Get an archetype by id.
    pub fn archetype(&self, id: &ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// Archetypes owned by a subsystem, ordered by id.
    pub fn archetypes_for(&self, subsystem: Subsystem) -> Vec<&Archetype> {
        self.archetypes
            .values()
            .filter(|a| a.subsystem == subsystem)
            .collect()
    }

    /// Every archetype id, ordered.
    pub fn list_archetypes(&self) -> Vec<&ArchetypeId> {
        self.archetypes.keys().collect()
    }

    /// Iterate over all archetypes, ordered by id.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.values()
    }

    pub fn universal_responses(&self) -> &[String] {
        &self.universal_responses
    }

    pub fn ritual_closures(&self) -> &[String] {
        &self.ritual_closures
    }

    pub fn crisis(&self) -> &CrisisProtocol {
        &self.crisis
    }

    pub fn safety(&self) -> &SafetyPatterns {
        &self.safety
    }
}

fn has_text(pool: &[String]) -> bool {
    pool.iter().any(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_catalog() -> MetaphorCatalog {
        let mut catalog = MetaphorCatalog::new();
        for subsystem in Subsystem::ARCHETYPAL {
            catalog = catalog.with_profile(SubsystemProfile::new(subsystem, "test"));
        }
        catalog
            .with_universal_response("The space holds what cannot be named.")
            .with_crisis(CrisisProtocol {
                patterns: vec![],
                response: "The container remains.".to_string(),
            })
            .with_safety(SafetyPatterns {
                forbidden: vec![],
                required: vec![],
                fallbacks: vec!["The container holds what is here.".to_string()],
            })
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = MetaphorCatalog::builtin().unwrap();

        for subsystem in Subsystem::ARCHETYPAL {
            assert!(catalog.profile(subsystem).is_some());
            assert!(!catalog.archetypes_for(subsystem).is_empty());
        }
        assert!(!catalog.universal_responses().is_empty());
        assert!(!catalog.ritual_closures().is_empty());
        assert!(!catalog.crisis().patterns.is_empty());
    }

    #[test]
    fn test_builtin_archetypes_belong_to_one_archetypal_subsystem() {
        let catalog = MetaphorCatalog::builtin().unwrap();
        for archetype in catalog.archetypes() {
            assert!(archetype.subsystem.is_archetypal(), "{}", archetype.id);
        }
    }

    #[test]
    fn test_minimal_catalog_validates() {
        assert!(minimal_catalog().validate().is_ok());
    }

    #[test]
    fn test_missing_profile_rejected() {
        let catalog = MetaphorCatalog::new()
            .with_profile(SubsystemProfile::new(Subsystem::Marrow, "deep"))
            .with_universal_response("Silence contains its own completeness.");

        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::MissingProfile(Subsystem::Root))
        ));
    }

    #[test]
    fn test_pseudo_subsystem_archetype_rejected() {
        let catalog = minimal_catalog().with_archetype(
            Archetype::new("the_void", Subsystem::Neutral).with_response("The void holds."),
        );

        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::PseudoSubsystem { .. })
        ));
    }

    #[test]
    fn test_archetype_without_responses_rejected() {
        let catalog = minimal_catalog().with_archetype(Archetype::new("the_mute", Subsystem::Root));

        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::EmptyResponses(id)) if id == "the_mute"
        ));
    }

    #[test]
    fn test_empty_fallback_pool_rejected() {
        let catalog = minimal_catalog().with_safety(SafetyPatterns::default());
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::EmptyPool("safety.fallbacks"))
        ));
    }

    #[test]
    fn test_archetypes_for_is_ordered() {
        let catalog = minimal_catalog()
            .with_archetype(Archetype::new("the_tide", Subsystem::Aura).with_response("holds"))
            .with_archetype(Archetype::new("the_mask", Subsystem::Aura).with_response("holds"))
            .with_archetype(Archetype::new("the_ember", Subsystem::Marrow).with_response("holds"));

        let aura: Vec<_> = catalog
            .archetypes_for(Subsystem::Aura)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(aura, vec!["the_mask", "the_tide"]);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, "archetypes: {}").unwrap();

        assert!(matches!(
            MetaphorCatalog::load(&path),
            Err(CatalogError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = MetaphorCatalog::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
