//! Archetype definitions - named symbolic template bundles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::Subsystem;

/// Unique archetype identifier, e.g. `the_ember`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchetypeId(pub String);

impl ArchetypeId {
    /// Sentinel for crisis-path responses.
    pub const CRISIS: &'static str = "crisis";
    /// Sentinel for responses drawn from the universal pool.
    pub const UNIVERSAL: &'static str = "universal";
    /// Sentinel for ritual command responses.
    pub const RITUAL: &'static str = "ritual";
    /// Sentinel for safe fallbacks produced at the turn boundary.
    pub const FALLBACK: &'static str = "fallback";
    /// Placeholder for ledger entries written before archetypes were recorded.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn crisis() -> Self {
        Self::new(Self::CRISIS)
    }

    pub fn universal() -> Self {
        Self::new(Self::UNIVERSAL)
    }

    pub fn ritual() -> Self {
        Self::new(Self::RITUAL)
    }

    pub fn fallback() -> Self {
        Self::new(Self::FALLBACK)
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id is one of the sentinels rather than a catalog archetype.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::CRISIS | Self::UNIVERSAL | Self::RITUAL | Self::FALLBACK | Self::UNKNOWN
        )
    }
}

impl std::fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArchetypeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A symbolic template bundle owned by exactly one subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub id: ArchetypeId,

    /// Flavor text. Never used computationally.
    pub descriptions: Vec<String>,

    /// Response templates, in catalog order.
    pub responses: Vec<String>,

    /// Context tags (time of day, element, season...).
    pub contexts: BTreeSet<String>,

    /// Lower-cased affective keywords used for context matching.
    pub affective_tags: BTreeSet<String>,

    pub subsystem: Subsystem,
}

impl Archetype {
    /// Create an archetype with no text.
    pub fn new(id: impl Into<String>, subsystem: Subsystem) -> Self {
        Self {
            id: ArchetypeId::new(id),
            descriptions: Vec::new(),
            responses: Vec::new(),
            contexts: BTreeSet::new(),
            affective_tags: BTreeSet::new(),
            subsystem,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.descriptions.push(description.into());
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.responses.push(response.into());
        self
    }

    pub fn with_responses<S: Into<String>>(mut self, responses: impl IntoIterator<Item = S>) -> Self {
        self.responses.extend(responses.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    /// Add affective tags (stored lower-cased).
    pub fn with_affective_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.affective_tags
            .extend(tags.into_iter().map(|t| t.into().to_lowercase()));
        self
    }

    /// Whether any affective tag occurs in the given lower-cased words.
    ///
    /// A multi-word tag such as `burned out` must appear as consecutive words.
    pub fn resonates_with(&self, words: &[&str]) -> bool {
        self.affective_tags.iter().any(|tag| {
            let tag_words: Vec<&str> = tag_words(tag).collect();
            !tag_words.is_empty()
                && words
                    .windows(tag_words.len())
                    .any(|window| window == tag_words.as_slice())
        })
    }

    /// Whether the archetype has at least one non-blank template.
    pub fn has_responses(&self) -> bool {
        self.responses.iter().any(|r| !r.trim().is_empty())
    }
}

/// Words of a tag, split the way user text is split for matching.
fn tag_words(tag: &str) -> impl Iterator<Item = &str> {
    tag.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
}
