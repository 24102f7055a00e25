//! Catalog errors. All of them are fatal at startup.

use std::path::PathBuf;
use thiserror::Error;

use crate::Subsystem;

/// Malformed or incomplete static data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog could not be read from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed catalog TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported catalog format `{0}` (expected .json or .toml)")]
    UnsupportedFormat(String),

    #[error("archetype `{archetype}` references undefined subsystem `{tag}`")]
    UnknownSubsystem { archetype: String, tag: String },

    #[error("archetype `{archetype}` cannot belong to pseudo-subsystem {subsystem}")]
    PseudoSubsystem {
        archetype: String,
        subsystem: Subsystem,
    },

    #[error("subsystem profile `{0}` does not name an archetypal subsystem")]
    UnknownProfile(String),

    #[error("subsystem {0} has no profile")]
    MissingProfile(Subsystem),

    #[error("archetype `{0}` has no usable response templates")]
    EmptyResponses(String),

    #[error("catalog pool `{0}` is empty")]
    EmptyPool(&'static str),

    #[error("subsystem {0} has no eligible archetypes")]
    NoArchetypes(Subsystem),

    #[error("invalid {kind} pattern `{pattern}`: {reason}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        reason: String,
    },
}

/// Returned when a string does not name a subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown subsystem `{0}`")]
pub struct ParseSubsystemError(pub String);
