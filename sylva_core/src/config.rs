//! Runtime configuration.
//!
//! Every section has a `Default`, so a TOML file only needs the keys it
//! changes. Environment variables are layered on top by
//! [`SylvaConfig::with_env_overrides`].

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::drift::DriftConfig;
use crate::error::ConfigError;
use crate::generator::GeneratorConfig;
use crate::memory::MemoryConfig;

/// Top-level configuration of a SYLVA session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SylvaConfig {
    pub memory: MemoryConfig,
    pub generator: GeneratorConfig,
    pub drift: DriftConfig,

    /// Catalog file to load instead of the built-in one.
    pub catalog_path: Option<PathBuf>,

    /// Seed for the response RNG. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl SylvaConfig {
    /// Parse a TOML configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `SYLVA_MEMORY`, `SYLVA_CATALOG`, `SYLVA_SEED` and `SYLVA_MAX_RECORDS`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = env::var("SYLVA_MEMORY") {
            self.memory.path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("SYLVA_CATALOG") {
            self.catalog_path = Some(PathBuf::from(path));
        }

        if let Ok(seed) = env::var("SYLVA_SEED") {
            match seed.parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => log::warn!("ignoring SYLVA_SEED={:?}: not an unsigned integer", seed),
            }
        }

        if let Ok(max) = env::var("SYLVA_MAX_RECORDS") {
            match max.parse() {
                Ok(max) => self.memory.max_records = max,
                Err(_) => log::warn!("ignoring SYLVA_MAX_RECORDS={:?}: not an unsigned integer", max),
            }
        }

        self
    }
}
