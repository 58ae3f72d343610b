#![forbid(unsafe_code)]
//! TOML configuration for recovery, the log writer and the index store.
//!
//! ```toml
//! [recovery]
//! scratch_capacity = 4096
//! entity_kind_policy = "end-of-log"   # or "corruption"
//! truncate_tail = true
//!
//! [writer]
//! sync_on_append = false
//!
//! [indexes.people]
//! type = "exact"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{IndexConfig, MemoryIndexStore};
use crate::log::LogWriterOptions;
use crate::replay::RecoveryOptions;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read index log config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse index log config {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Complete configuration file contents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexLogConfig {
    /// Recovery pass settings.
    pub recovery: RecoveryOptions,
    /// Log writer settings.
    pub writer: LogWriterOptions,
    /// Index name to configuration, served by [`IndexLogConfig::index_store`].
    pub indexes: BTreeMap<String, IndexConfig>,
}

impl IndexLogConfig {
    /// Loads `explicit`, or the default location when `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(default_config_path);
        match path {
            Some(path) if path.exists() => read_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Builds an index store holding every configured index.
    pub fn index_store(&self) -> MemoryIndexStore {
        self.indexes
            .iter()
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect()
    }
}

fn read_file(path: &Path) -> Result<IndexLogConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    IndexLogConfig::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Per-user default config location, `<config dir>/sombra/indexlog.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("sombra").join("indexlog.toml"))
}
