//! Error types for the core.

use std::path::PathBuf;
use sylva_catalog::CatalogError;
use thiserror::Error;

/// Errors surfaced by the core's entry points.
///
/// Per-turn errors never reach the user: [`crate::Sylva::respond`] converts
/// them into a safe fallback response.
#[derive(Debug, Error)]
pub enum SylvaError {
    /// Empty or whitespace-only text reached the router.
    #[error("input text is empty")]
    InvalidInput,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Persistence failures of the memory store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config could not be read from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}
