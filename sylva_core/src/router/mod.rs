//! Subsystem Router - decides which subsystem answers a statement.
//!
//! The routing algorithm works as follows:
//! 1. **Guard**: Reject empty or whitespace-only text
//! 2. **Crisis**: If any crisis pattern matches, resolve to `CRISIS` immediately
//! 3. **Scoring**: For each archetypal subsystem, sum the weights of its keywords
//!    present in the lower-cased text (words weigh 1, phrases weigh 2, each
//!    keyword counts once)
//! 4. **Selection**: Highest score wins; ties go to the deepest subsystem
//!    (MARROW, then ROOT, then AURA); an all-zero score resolves to `NEUTRAL`

mod keywords;

pub use keywords::*;

use regex::Regex;
use std::collections::BTreeMap;
use sylva_catalog::{CatalogError, MetaphorCatalog, Subsystem};

use crate::error::SylvaError;

/// Routing keywords of one subsystem.
#[derive(Debug, Clone)]
struct KeywordTable {
    subsystem: Subsystem,
    keywords: Vec<KeywordPattern>,
}

/// The outcome of routing, with everything needed to explain it.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteReport {
    pub subsystem: Subsystem,

    /// Score per archetypal subsystem. Empty when the crisis override fired.
    pub scores: BTreeMap<Subsystem, u32>,

    /// Keywords (or the crisis pattern) that matched.
    pub matched: Vec<String>,

    /// Whether the crisis override decided the route.
    pub crisis: bool,
}

impl RouteReport {
    /// Score of a subsystem (0 if it did not compete).
    pub fn score(&self, subsystem: Subsystem) -> u32 {
        self.scores.get(&subsystem).copied().unwrap_or(0)
    }
}

/// Deterministic keyword router. Pure once built.
#[derive(Debug, Clone)]
pub struct SubsystemRouter {
    /// Kept in tie-break priority order.
    tables: Vec<KeywordTable>,
    crisis: Vec<Regex>,
}

impl SubsystemRouter {
    /// Compile the catalog's keyword tables and crisis patterns.
    pub fn from_catalog(catalog: &MetaphorCatalog) -> Result<Self, CatalogError> {
        let mut tables = Vec::with_capacity(Subsystem::ARCHETYPAL.len());

        for subsystem in Subsystem::ARCHETYPAL {
            let profile = catalog
                .profile(subsystem)
                .ok_or(CatalogError::MissingProfile(subsystem))?;

            let keywords = profile
                .keywords
                .iter()
                .map(|k| KeywordPattern::compile(k))
                .collect::<Result<Vec<_>, _>>()?;

            tables.push(KeywordTable {
                subsystem,
                keywords,
            });
        }

        let crisis = catalog
            .crisis()
            .patterns
            .iter()
            .map(|p| compile_pattern("crisis", p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tables, crisis })
    }

    /// Route text to a subsystem.
    pub fn route(&self, text: &str) -> Result<Subsystem, SylvaError> {
        Ok(self.explain(text)?.subsystem)
    }

    /// Route text and report the scores behind the decision.
    pub fn explain(&self, text: &str) -> Result<RouteReport, SylvaError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SylvaError::InvalidInput);
        }

        if let Some(pattern) = self.crisis_match(text) {
            log::debug!("crisis override matched");
            return Ok(RouteReport {
                subsystem: Subsystem::Crisis,
                scores: BTreeMap::new(),
                matched: vec![pattern.to_string()],
                crisis: true,
            });
        }

        let lowered = text.to_lowercase();
        let mut scores = BTreeMap::new();
        let mut matched = Vec::new();

        for table in &self.tables {
            let mut score = 0;
            for keyword in table.keywords.iter().filter(|k| k.is_match(&lowered)) {
                score += keyword.weight();
                matched.push(keyword.keyword().to_string());
            }
            scores.insert(table.subsystem, score);
        }

        let subsystem = self.select(&scores);
        log::debug!("routed to {} with scores {:?}", subsystem, scores);

        Ok(RouteReport {
            subsystem,
            scores,
            matched,
            crisis: false,
        })
    }

    /// Whether the text trips the crisis override.
    pub fn is_crisis(&self, text: &str) -> bool {
        self.crisis_match(text).is_some()
    }

    fn crisis_match(&self, text: &str) -> Option<&str> {
        self.crisis
            .iter()
            .find(|re| re.is_match(text))
            .map(|re| re.as_str())
    }

    /// Highest score wins; on a tie the earlier table (higher priority) is kept.
    fn select(&self, scores: &BTreeMap<Subsystem, u32>) -> Subsystem {
        let mut best = (Subsystem::Neutral, 0);

        for table in &self.tables {
            let score = scores.get(&table.subsystem).copied().unwrap_or(0);
            if score > best.1 {
                best = (table.subsystem, score);
            }
        }

        best.0
    }
}
