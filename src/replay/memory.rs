use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use super::CommandApplier;
use crate::command::Command;
use crate::index::{EntityKind, IndexIdentifier};
use crate::types::Result;

/// Entries of one index as materialized by [`MemoryIndex`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexEntries {
    entries: BTreeSet<(String, String, i64)>,
    endpoints: BTreeMap<i64, (i64, i64)>,
}

impl IndexEntries {
    /// Returns true if `(key, value)` maps to `entity_id`.
    pub fn contains(&self, key: &str, value: &str, entity_id: i64) -> bool {
        self.entries
            .contains(&(key.to_owned(), value.to_owned(), entity_id))
    }

    /// Endpoints recorded for a relationship entity.
    pub fn endpoints(&self, entity_id: i64) -> Option<(i64, i64)> {
        self.endpoints.get(&entity_id).copied()
    }

    /// Number of `(key, value, entity)` entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: String, value: String, entity_id: i64) {
        self.entries.insert((key, value, entity_id));
    }

    fn remove(&mut self, key: String, value: String, entity_id: i64) {
        self.entries.remove(&(key, value, entity_id));
        if !self.entries.iter().any(|(_, _, id)| *id == entity_id) {
            self.endpoints.remove(&entity_id);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.endpoints.clear();
    }
}

/// Per-index entry count, for reports.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IndexSummary {
    /// Index name.
    pub name: String,
    /// Entity kind of the index.
    pub entity_kind: EntityKind,
    /// Entry count after replay.
    pub entries: usize,
}

/// In-memory applier that materializes replayed commands.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    indexes: HashMap<IndexIdentifier, IndexEntries>,
}

impl MemoryIndex {
    /// Creates an empty applier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of `index`, if any command touched it.
    pub fn get(&self, index: &IndexIdentifier) -> Option<&IndexEntries> {
        self.indexes.get(index)
    }

    /// Entry counts of every touched index, sorted by kind then name.
    pub fn summary(&self) -> Vec<IndexSummary> {
        let mut out: Vec<IndexSummary> = self
            .indexes
            .iter()
            .map(|(id, entries)| IndexSummary {
                name: id.name().to_owned(),
                entity_kind: id.entity_kind(),
                entries: entries.len(),
            })
            .collect();
        out.sort_by(|a, b| (a.entity_kind, &a.name).cmp(&(b.entity_kind, &b.name)));
        out
    }
}

impl CommandApplier for MemoryIndex {
    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Add {
                index,
                entity_id,
                key,
                value,
            } => {
                self.indexes
                    .entry(index)
                    .or_default()
                    .insert(key, value, entity_id);
            }
            Command::AddRelationship {
                index,
                entity_id,
                key,
                value,
                start_node_id,
                end_node_id,
            } => {
                let entries = self.indexes.entry(index).or_default();
                entries.insert(key, value, entity_id);
                entries
                    .endpoints
                    .insert(entity_id, (start_node_id, end_node_id));
            }
            Command::Remove {
                index,
                entity_id,
                key,
                value,
            } => {
                if let Some(entries) = self.indexes.get_mut(&index) {
                    entries.remove(key, value, entity_id);
                }
            }
            Command::Clear { index } => {
                self.indexes.entry(index).or_default().clear();
            }
        }
        Ok(())
    }
}
