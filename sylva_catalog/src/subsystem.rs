//! Subsystem definitions - the fixed top-level response categories.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ParseSubsystemError;

/// The closed set of response categories.
///
/// `Marrow`, `Root` and `Aura` are backed by archetypes. `Neutral` and
/// `Crisis` are pseudo-categories the router can resolve to; no archetype
/// may belong to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Subsystem {
    /// Deep core processing: essence, wounds, transformation.
    #[serde(alias = "marrow")]
    Marrow,

    /// Grounding and stability: foundation, safety, basic needs.
    #[serde(alias = "root")]
    Root,

    /// Protective boundary: energy, interface with the world.
    #[serde(alias = "aura")]
    Aura,

    /// Nothing in the text scored.
    #[serde(alias = "neutral")]
    Neutral,

    /// High-severity language was detected.
    #[serde(alias = "crisis")]
    Crisis,
}

impl Subsystem {
    /// Archetype-backed subsystems in tie-break priority order (deepest core first).
    pub const ARCHETYPAL: [Subsystem; 3] = [Subsystem::Marrow, Subsystem::Root, Subsystem::Aura];

    /// Every category, in declaration order.
    pub const ALL: [Subsystem; 5] = [
        Subsystem::Marrow,
        Subsystem::Root,
        Subsystem::Aura,
        Subsystem::Neutral,
        Subsystem::Crisis,
    ];

    /// Canonical upper-case name, as persisted in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Marrow => "MARROW",
            Subsystem::Root => "ROOT",
            Subsystem::Aura => "AURA",
            Subsystem::Neutral => "NEUTRAL",
            Subsystem::Crisis => "CRISIS",
        }
    }

    /// Whether archetypes can belong to this subsystem.
    pub fn is_archetypal(&self) -> bool {
        matches!(self, Subsystem::Marrow | Subsystem::Root | Subsystem::Aura)
    }

    /// Tie-break rank; lower wins. Pseudo-categories never compete.
    pub fn priority(&self) -> u8 {
        match self {
            Subsystem::Marrow => 0,
            Subsystem::Root => 1,
            Subsystem::Aura => 2,
            Subsystem::Neutral => 3,
            Subsystem::Crisis => 4,
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Subsystem {
    type Err = ParseSubsystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MARROW" => Ok(Subsystem::Marrow),
            "ROOT" => Ok(Subsystem::Root),
            "AURA" => Ok(Subsystem::Aura),
            "NEUTRAL" => Ok(Subsystem::Neutral),
            "CRISIS" => Ok(Subsystem::Crisis),
            _ => Err(ParseSubsystemError(s.to_string())),
        }
    }
}

/// Static description and routing vocabulary of an archetypal subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemProfile {
    pub subsystem: Subsystem,

    /// Human-readable description.
    pub description: String,

    /// What the subsystem attends to.
    #[serde(default)]
    pub focus: String,

    /// Routing keywords. Multi-word entries are phrases.
    pub keywords: Vec<String>,

    /// Optional phrase the generator may append to name the subsystem's presence.
    #[serde(default)]
    pub echo: Option<String>,
}

impl SubsystemProfile {
    /// Create a profile with no keywords.
    pub fn new(subsystem: Subsystem, description: impl Into<String>) -> Self {
        Self {
            subsystem,
            description: description.into(),
            focus: String::new(),
            keywords: Vec::new(),
            echo: None,
        }
    }

    /// Add a routing keyword (stored lower-cased).
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into().to_lowercase());
        self
    }

    /// Add several routing keywords.
    pub fn with_keywords<S: Into<String>>(mut self, keywords: impl IntoIterator<Item = S>) -> Self {
        self.keywords
            .extend(keywords.into_iter().map(|k| k.into().to_lowercase()));
        self
    }

    /// Set the echo phrase.
    pub fn with_echo(mut self, echo: impl Into<String>) -> Self {
        self.echo = Some(echo.into());
        self
    }

    /// Set the focus line.
    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = focus.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut ranked = Subsystem::ARCHETYPAL.to_vec();
        ranked.sort_by_key(|s| s.priority());
        assert_eq!(ranked, vec![Subsystem::Marrow, Subsystem::Root, Subsystem::Aura]);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("marrow".parse::<Subsystem>(), Ok(Subsystem::Marrow));
        assert_eq!(" Aura ".parse::<Subsystem>(), Ok(Subsystem::Aura));
        assert!("SPLEEN".parse::<Subsystem>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Subsystem::Root).unwrap();
        assert_eq!(json, "\"ROOT\"");

        let parsed: Subsystem = serde_json::from_str("\"crisis\"").unwrap();
        assert_eq!(parsed, Subsystem::Crisis);
    }

    #[test]
    fn test_pseudo_categories_are_not_archetypal() {
        assert!(Subsystem::Marrow.is_archetypal());
        assert!(!Subsystem::Neutral.is_archetypal());
        assert!(!Subsystem::Crisis.is_archetypal());
    }

    #[test]
    fn test_profile_keywords_lowercased() {
        let profile = SubsystemProfile::new(Subsystem::Root, "Grounding")
            .with_keyword("Unstable")
            .with_keywords(["Out Of Control"]);
        assert_eq!(profile.keywords, vec!["unstable", "out of control"]);
    }
}
