//! Response Generator - turns a routed subsystem into symbolic text.
//!
//! Generation proceeds in this order, drawing every random choice from the
//! injected source:
//! 1. **Crisis**: the catalog's fixed crisis phrase, verbatim and unscreened
//! 2. **Base**: a universal response (NEUTRAL, or the bypass roll), otherwise
//!    a template from an archetype of the subsystem, preferring archetypes
//!    whose affective tags appear in the text
//! 3. **Echo**: optionally the subsystem's echo phrase
//! 4. **Closure**: optionally a ritual closure
//! 5. **Screening**: the composed text passes through the [`SafetyFilter`]

mod safety;

pub use safety::*;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sylva_catalog::{Archetype, ArchetypeId, CatalogError, MetaphorCatalog, Subsystem};

use crate::error::SylvaError;

/// Configuration for response composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Chance that an archetypal subsystem answers from the universal pool.
    pub universal_probability: f64,

    /// Chance of appending the subsystem's echo phrase.
    pub echo_probability: f64,

    /// Chance of appending a ritual closure.
    pub closure_probability: f64,

    /// What the safety filter does with text lacking containment language.
    pub containment: ContainmentPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            universal_probability: 0.3,
            echo_probability: 0.3,
            closure_probability: 1.0,
            containment: ContainmentPolicy::Enforce,
        }
    }
}

/// A screened response and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedResponse {
    pub text: String,
    pub archetype_id: ArchetypeId,
    pub subsystem: Subsystem,
    pub screening: Screening,
}

/// Composes responses from an immutable catalog.
#[derive(Debug, Clone)]
pub struct ResponseGenerator {
    catalog: Arc<MetaphorCatalog>,
    filter: SafetyFilter,
    config: GeneratorConfig,
}

impl ResponseGenerator {
    /// Build a generator and compile the catalog's safety patterns.
    pub fn new(catalog: Arc<MetaphorCatalog>, config: GeneratorConfig) -> Result<Self, CatalogError> {
        let filter = SafetyFilter::new(catalog.safety(), config.containment)?;
        Ok(Self {
            catalog,
            filter,
            config,
        })
    }

    pub fn catalog(&self) -> &MetaphorCatalog {
        &self.catalog
    }

    pub fn filter(&self) -> &SafetyFilter {
        &self.filter
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the response for a routed subsystem.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        subsystem: Subsystem,
        text: &str,
        rng: &mut R,
    ) -> Result<GeneratedResponse, SylvaError> {
        if subsystem == Subsystem::Crisis {
            return Ok(GeneratedResponse {
                text: self.catalog.crisis().response.clone(),
                archetype_id: ArchetypeId::crisis(),
                subsystem,
                screening: Screening::Bypassed,
            });
        }

        let bypass = subsystem == Subsystem::Neutral
            || rng.gen_bool(probability(self.config.universal_probability));

        let (mut composed, archetype_id) = if bypass {
            (self.universal(rng)?.to_string(), ArchetypeId::universal())
        } else {
            let archetype = self.select_archetype(subsystem, text, rng)?;
            (self.select_template(archetype, rng)?.to_string(), archetype.id.clone())
        };

        if rng.gen_bool(probability(self.config.echo_probability)) {
            if let Some(echo) = self.catalog.profile(subsystem).and_then(|p| p.echo.as_deref()) {
                append_sentence(&mut composed, echo);
            }
        }

        if rng.gen_bool(probability(self.config.closure_probability)) && !self.ends_with_closure(&composed) {
            if let Some(closure) = self.catalog.ritual_closures().choose(rng) {
                append_sentence(&mut composed, closure);
            }
        }

        let screened = self.filter.screen(composed, rng);
        log::debug!(
            "generated {} response from {} ({:?})",
            subsystem,
            archetype_id,
            screened.screening
        );

        Ok(GeneratedResponse {
            text: screened.text,
            archetype_id,
            subsystem,
            screening: screened.screening,
        })
    }

    /// A pre-approved fallback for a turn that failed.
    pub fn fallback<R: Rng + ?Sized>(&self, subsystem: Subsystem, rng: &mut R) -> GeneratedResponse {
        GeneratedResponse {
            text: self.filter.fallback(rng).to_string(),
            archetype_id: ArchetypeId::fallback(),
            subsystem,
            screening: Screening::Bypassed,
        }
    }

    /// Draw from the universal pool.
    pub fn universal<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&str, CatalogError> {
        self.catalog
            .universal_responses()
            .choose(rng)
            .map(String::as_str)
            .ok_or(CatalogError::EmptyPool("universal_responses"))
    }

    /// Pick an archetype, preferring ones whose affective tags occur in the text.
    pub fn select_archetype<R: Rng + ?Sized>(
        &self,
        subsystem: Subsystem,
        text: &str,
        rng: &mut R,
    ) -> Result<&Archetype, CatalogError> {
        let eligible: Vec<&Archetype> = self
            .catalog
            .archetypes_for(subsystem)
            .into_iter()
            .filter(|a| a.has_responses())
            .collect();

        if eligible.is_empty() {
            return Err(CatalogError::NoArchetypes(subsystem));
        }

        let words = affective_words(text);
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        let resonant: Vec<&Archetype> = eligible
            .iter()
            .copied()
            .filter(|a| a.resonates_with(&words))
            .collect();

        let pool = if resonant.is_empty() { &eligible } else { &resonant };
        pool.choose(rng)
            .copied()
            .ok_or(CatalogError::NoArchetypes(subsystem))
    }

    fn select_template<'a, R: Rng + ?Sized>(
        &self,
        archetype: &'a Archetype,
        rng: &mut R,
    ) -> Result<&'a str, CatalogError> {
        let templates: Vec<&str> = archetype
            .responses
            .iter()
            .map(String::as_str)
            .filter(|r| !r.trim().is_empty())
            .collect();

        templates
            .choose(rng)
            .copied()
            .ok_or_else(|| CatalogError::EmptyResponses(archetype.id.to_string()))
    }

    fn ends_with_closure(&self, text: &str) -> bool {
        let text = text.trim_end();
        self.catalog
            .ritual_closures()
            .iter()
            .any(|closure| text.ends_with(closure.as_str()))
    }
}

/// Lower-cased words of the text, apostrophes kept.
fn affective_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn append_sentence(text: &mut String, sentence: &str) {
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(sentence.trim());
}

/// `gen_bool` panics outside [0, 1].
fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
