use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use super::store::{IndexConfig, IndexStore};

/// Kind of graph entity an index maps entries to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Entries point at nodes.
    Node,
    /// Entries point at relationships.
    Relationship,
}

impl EntityKind {
    /// Wire byte identifying node indexes.
    pub const NODE_BYTE: u8 = 1;
    /// Wire byte identifying relationship indexes.
    pub const RELATIONSHIP_BYTE: u8 = 2;

    /// Returns the byte written for this kind.
    pub fn to_byte(self) -> u8 {
        match self {
            EntityKind::Node => Self::NODE_BYTE,
            EntityKind::Relationship => Self::RELATIONSHIP_BYTE,
        }
    }

    /// Decodes a wire byte; any value other than 1 or 2 has no kind.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::NODE_BYTE => Some(EntityKind::Node),
            Self::RELATIONSHIP_BYTE => Some(EntityKind::Relationship),
            _ => None,
        }
    }

    /// Lowercase name used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Relationship => "relationship",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved reference to a named index.
///
/// Two identifiers are equal when they share entity kind and name; the
/// configuration snapshot does not take part in identity.
#[derive(Clone, Debug, Serialize)]
pub struct IndexIdentifier {
    entity_kind: EntityKind,
    name: String,
    config: Option<IndexConfig>,
}

impl IndexIdentifier {
    /// Builds an identifier from parts already at hand.
    pub fn new(entity_kind: EntityKind, name: impl Into<String>, config: Option<IndexConfig>) -> Self {
        Self {
            entity_kind,
            name: name.into(),
            config,
        }
    }

    /// Looks up the configuration registered under `name` and pairs it with
    /// the entity kind supplied by the caller.
    ///
    /// An unregistered name yields an identifier without configuration; the
    /// index may have been dropped after the command was logged.
    pub fn resolve(entity_kind: EntityKind, name: &str, store: &dyn IndexStore) -> Self {
        Self::new(entity_kind, name, store.config(name))
    }

    /// Entity kind the index maps entries to.
    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration snapshot taken at resolution time, if the index was registered.
    pub fn config(&self) -> Option<&IndexConfig> {
        self.config.as_ref()
    }
}

impl PartialEq for IndexIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.entity_kind == other.entity_kind && self.name == other.name
    }
}

impl Eq for IndexIdentifier {}

impl Hash for IndexIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_kind.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for IndexIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_kind, self.name)
    }
}
