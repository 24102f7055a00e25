//! Safety Filter - screens generated text before it reaches the user.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sylva_catalog::{CatalogError, SafetyPatterns};
use thiserror::Error;

use crate::router::compile_pattern;

/// What happens to a candidate with no containment language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainmentPolicy {
    /// Replace it with a fallback.
    #[default]
    Enforce,
    /// Keep it and log a warning.
    Warn,
}

/// Why a candidate failed screening. Never leaves the filter as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("forbidden pattern `{0}` matched")]
    Forbidden(String),

    #[error("no containment pattern matched")]
    Uncontained,
}

/// How a response got through the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// Passed every check.
    Passed,
    /// Kept despite a violation, per [`ContainmentPolicy::Warn`].
    Warned(SafetyViolation),
    /// Discarded and replaced with a fallback.
    Substituted(SafetyViolation),
    /// Pre-vetted text that is not screened (the crisis phrase).
    Bypassed,
}

/// Screened text and the verdict that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screened {
    pub text: String,
    pub screening: Screening,
}

/// Regex-based screen over forbidden and required language.
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    forbidden: Vec<Regex>,
    required: Vec<Regex>,
    fallbacks: Vec<String>,
    policy: ContainmentPolicy,
}

impl SafetyFilter {
    /// Compile the catalog's safety patterns.
    pub fn new(patterns: &SafetyPatterns, policy: ContainmentPolicy) -> Result<Self, CatalogError> {
        let forbidden = patterns
            .forbidden
            .iter()
            .map(|p| compile_pattern("forbidden", p))
            .collect::<Result<Vec<_>, _>>()?;
        let required = patterns
            .required
            .iter()
            .map(|p| compile_pattern("required", p))
            .collect::<Result<Vec<_>, _>>()?;
        let fallbacks: Vec<String> = patterns
            .fallbacks
            .iter()
            .filter(|f| !f.trim().is_empty())
            .cloned()
            .collect();

        if fallbacks.is_empty() {
            return Err(CatalogError::EmptyPool("safety.fallbacks"));
        }

        Ok(Self {
            forbidden,
            required,
            fallbacks,
            policy,
        })
    }

    pub fn policy(&self) -> ContainmentPolicy {
        self.policy
    }

    /// Check a candidate. Forbidden language is checked first.
    ///
    /// An empty required set is treated as satisfied.
    pub fn check(&self, text: &str) -> Result<(), SafetyViolation> {
        if let Some(pattern) = self.forbidden_match(text) {
            return Err(SafetyViolation::Forbidden(pattern.to_string()));
        }

        if !self.required.is_empty() && !self.is_contained(text) {
            return Err(SafetyViolation::Uncontained);
        }

        Ok(())
    }

    /// The first forbidden pattern the text matches.
    pub fn forbidden_match(&self, text: &str) -> Option<&str> {
        self.forbidden
            .iter()
            .find(|re| re.is_match(text))
            .map(|re| re.as_str())
    }

    /// Whether the text carries at least one containment phrase.
    pub fn is_contained(&self, text: &str) -> bool {
        self.required.iter().any(|re| re.is_match(text))
    }

    /// Screen a candidate, substituting a whole fallback on failure.
    pub fn screen<R: Rng + ?Sized>(&self, candidate: String, rng: &mut R) -> Screened {
        match self.check(&candidate) {
            Ok(()) => Screened {
                text: candidate,
                screening: Screening::Passed,
            },
            Err(SafetyViolation::Uncontained) if self.policy == ContainmentPolicy::Warn => {
                log::warn!("response carries no containment language; kept per policy");
                Screened {
                    text: candidate,
                    screening: Screening::Warned(SafetyViolation::Uncontained),
                }
            }
            Err(violation) => {
                log::warn!("response discarded ({}); substituting fallback", violation);
                Screened {
                    text: self.fallback(rng).to_string(),
                    screening: Screening::Substituted(violation),
                }
            }
        }
    }

    /// Screen a candidate and keep only the resulting text.
    pub fn validate<R: Rng + ?Sized>(&self, candidate: String, rng: &mut R) -> String {
        self.screen(candidate, rng).text
    }

    /// A pre-approved replacement phrase.
    pub fn fallback<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.fallbacks
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_else(|| self.fallbacks[0].as_str())
    }

    /// Every fallback phrase.
    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }
}
