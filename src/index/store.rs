use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Opaque per-index configuration, such as `type = "exact"`.
///
/// The command log never interprets it; it is carried on resolved
/// identifiers for whoever applies the command.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexConfig(BTreeMap<String, String>);

impl IndexConfig {
    /// Builds a configuration from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true when no entries are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lookup service mapping index names to their configuration.
pub trait IndexStore: Send + Sync {
    /// Returns the configuration registered under `name`.
    fn config(&self, name: &str) -> Option<IndexConfig>;
}

impl IndexStore for HashMap<String, IndexConfig> {
    fn config(&self, name: &str) -> Option<IndexConfig> {
        self.get(name).cloned()
    }
}

impl IndexStore for BTreeMap<String, IndexConfig> {
    fn config(&self, name: &str) -> Option<IndexConfig> {
        self.get(name).cloned()
    }
}

/// Thread-safe in-memory index store.
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    entries: RwLock<HashMap<String, IndexConfig>>,
}

impl MemoryIndexStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the configuration for `name`.
    pub fn register(&self, name: impl Into<String>, config: IndexConfig) {
        self.entries.write().insert(name.into(), config);
    }

    /// Removes `name`, returning its last configuration.
    pub fn remove(&self, name: &str) -> Option<IndexConfig> {
        self.entries.write().remove(name)
    }

    /// Number of registered indexes.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl IndexStore for MemoryIndexStore {
    fn config(&self, name: &str) -> Option<IndexConfig> {
        self.entries.read().get(name).cloned()
    }
}

impl FromIterator<(String, IndexConfig)> for MemoryIndexStore {
    fn from_iter<I: IntoIterator<Item = (String, IndexConfig)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().collect()),
        }
    }
}
