//! On-disk catalog document and its conversion into a validated catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{CrisisProtocol, MetaphorCatalog, SafetyPatterns};
use crate::{Archetype, CatalogError, Subsystem, SubsystemProfile};

/// Raw catalog as written in JSON or TOML.
///
/// Subsystem tags stay plain strings here so an undefined tag is reported
/// with the archetype that carries it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CatalogDocument {
    pub subsystems: BTreeMap<String, ProfileEntry>,
    pub archetypes: BTreeMap<String, ArchetypeEntry>,
    pub universal_responses: Vec<String>,
    #[serde(default)]
    pub ritual_closures: Vec<String>,
    pub crisis: CrisisProtocol,
    pub safety: SafetyPatterns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProfileEntry {
    pub description: String,
    #[serde(default)]
    pub focus: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub echo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ArchetypeEntry {
    #[serde(default, alias = "description")]
    pub descriptions: Vec<String>,
    pub responses: Vec<String>,
    #[serde(default, alias = "context")]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub affective_tags: Vec<String>,
    pub subsystem: String,
}

impl TryFrom<CatalogDocument> for MetaphorCatalog {
    type Error = CatalogError;

    fn try_from(document: CatalogDocument) -> Result<Self, Self::Error> {
        let mut catalog = MetaphorCatalog::new();

        for (name, entry) in document.subsystems {
            let subsystem = name
                .parse::<Subsystem>()
                .ok()
                .filter(Subsystem::is_archetypal)
                .ok_or_else(|| CatalogError::UnknownProfile(name.clone()))?;

            let mut profile = SubsystemProfile::new(subsystem, entry.description)
                .with_focus(entry.focus)
                .with_keywords(entry.keywords);
            profile.echo = entry.echo;
            catalog = catalog.with_profile(profile);
        }

        for (id, entry) in document.archetypes {
            let subsystem =
                entry
                    .subsystem
                    .parse::<Subsystem>()
                    .map_err(|_| CatalogError::UnknownSubsystem {
                        archetype: id.clone(),
                        tag: entry.subsystem.clone(),
                    })?;

            let mut archetype = Archetype::new(id, subsystem)
                .with_responses(entry.responses)
                .with_affective_tags(entry.affective_tags);
            archetype.descriptions = entry.descriptions;
            archetype.contexts = entry.contexts.into_iter().collect();
            catalog = catalog.with_archetype(archetype);
        }

        catalog.universal_responses = document.universal_responses;
        catalog.ritual_closures = document.ritual_closures;
        catalog.crisis = document.crisis;
        catalog.safety = document.safety;

        catalog.validate()?;
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArchetypeId;

    const SMALL_JSON: &str = r#"{
        "subsystems": {
            "MARROW": { "description": "Deep core", "keywords": ["shame", "hollow"] },
            "ROOT": { "description": "Grounding", "keywords": ["unstable"] },
            "AURA": { "description": "Boundary", "keywords": ["overwhelmed"], "echo": "The boundary honors what is needed." }
        },
        "archetypes": {
            "the_ember": {
                "description": ["A small fire"],
                "responses": ["The ember holds steady in the wind."],
                "affective_tags": ["Shame"],
                "subsystem": "MARROW"
            }
        },
        "universal_responses": ["The space holds what cannot be named."],
        "crisis": { "patterns": ["\\bhurt\\s+myself\\b"], "response": "The container remains." },
        "safety": { "forbidden": [], "required": [], "fallbacks": ["The container holds what is here."] }
    }"#;

    #[test]
    fn test_json_document_converts() {
        let catalog = MetaphorCatalog::from_json_str(SMALL_JSON).unwrap();

        let ember = catalog.archetype(&ArchetypeId::new("the_ember")).unwrap();
        assert_eq!(ember.subsystem, Subsystem::Marrow);
        assert_eq!(ember.descriptions, vec!["A small fire"]);
        assert!(ember.affective_tags.contains("shame"));

        let aura = catalog.profile(Subsystem::Aura).unwrap();
        assert_eq!(aura.echo.as_deref(), Some("The boundary honors what is needed."));
        assert!(catalog.ritual_closures().is_empty());
    }

    #[test]
    fn test_undefined_subsystem_tag() {
        let json = SMALL_JSON.replace("\"subsystem\": \"MARROW\"", "\"subsystem\": \"SPLEEN\"");

        match MetaphorCatalog::from_json_str(&json) {
            Err(CatalogError::UnknownSubsystem { archetype, tag }) => {
                assert_eq!(archetype, "the_ember");
                assert_eq!(tag, "SPLEEN");
            }
            other => panic!("expected UnknownSubsystem, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field() {
        let json = SMALL_JSON.replace("\"responses\": [\"The ember holds steady in the wind.\"],", "");
        assert!(matches!(
            MetaphorCatalog::from_json_str(&json),
            Err(CatalogError::Json(_))
        ));
    }

    #[test]
    fn test_profile_for_pseudo_subsystem_rejected() {
        let json = SMALL_JSON.replace("\"ROOT\": {", "\"CRISIS\": {");
        assert!(matches!(
            MetaphorCatalog::from_json_str(&json),
            Err(CatalogError::UnknownProfile(name)) if name == "CRISIS"
        ));
    }

    #[test]
    fn test_toml_document_converts() {
        let text = r#"
            universal_responses = ["Silence contains its own completeness."]

            [subsystems.MARROW]
            description = "Deep core"
            keywords = ["shame"]

            [subsystems.ROOT]
            description = "Grounding"
            keywords = ["unstable"]

            [subsystems.AURA]
            description = "Boundary"
            keywords = ["drained"]

            [archetypes.the_mountain]
            responses = ["Stone holds its place while the weather passes."]
            subsystem = "ROOT"

            [crisis]
            patterns = []
            response = "The container remains."

            [safety]
            forbidden = []
            required = []
            fallbacks = ["The container holds what is here."]
        "#;

        let catalog = MetaphorCatalog::from_toml_str(text).unwrap();
        assert_eq!(catalog.archetypes_for(Subsystem::Root).len(), 1);
    }
}
