#![forbid(unsafe_code)]
//! Index mutation commands as written to the transaction log.
//!
//! A [`Command`] is created once when a transaction mutates an index, written
//! once to the log through [`encode`], and rebuilt by [`decode_next`] each
//! time the log is replayed. Commands are plain values and never change after
//! construction.

mod codec;

pub use codec::{
    decode_next, encode, encoded_len, CommandReader, DecodeOptions, EntityKindPolicy, StopReason,
    ADD_COMMAND, CLEAR_COMMAND, FIXED_HEADER_LEN, RELATIONSHIP_TAIL_LEN, REMOVE_COMMAND,
};

use serde::Serialize;

use crate::index::{EntityKind, IndexIdentifier};
use crate::types::{IndexLogError, Result};

/// Entity id carried by [`Command::Clear`], which affects no single entity.
pub const CLEAR_ENTITY_ID: i64 = -1;

/// Discriminant of a [`Command`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Node entry added.
    Add,
    /// Relationship entry added, with its endpoints.
    AddRelationship,
    /// Entry removed.
    Remove,
    /// Whole index cleared.
    Clear,
}

impl CommandKind {
    /// Command type byte written for this kind. `AddRelationship` shares the
    /// `Add` byte; the entity kind byte tells them apart.
    pub fn type_byte(self) -> u8 {
        match self {
            CommandKind::Add | CommandKind::AddRelationship => ADD_COMMAND,
            CommandKind::Remove => REMOVE_COMMAND,
            CommandKind::Clear => CLEAR_COMMAND,
        }
    }

    /// Name used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Add => "add",
            CommandKind::AddRelationship => "add_relationship",
            CommandKind::Remove => "remove",
            CommandKind::Clear => "clear",
        }
    }
}

/// One index mutation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Maps `(key, value)` to a node in a node index.
    Add {
        /// Target index; always a node index.
        index: IndexIdentifier,
        /// Node id.
        entity_id: i64,
        /// Property key.
        key: String,
        /// Indexed value.
        value: String,
    },
    /// Maps `(key, value)` to a relationship in a relationship index.
    AddRelationship {
        /// Target index; always a relationship index.
        index: IndexIdentifier,
        /// Relationship id.
        entity_id: i64,
        /// Property key.
        key: String,
        /// Indexed value.
        value: String,
        /// Start node of the relationship.
        start_node_id: i64,
        /// End node of the relationship.
        end_node_id: i64,
    },
    /// Removes the `(key, value)` entry for an entity.
    Remove {
        /// Target index of either entity kind.
        index: IndexIdentifier,
        /// Node or relationship id, per the index's entity kind.
        entity_id: i64,
        /// Property key.
        key: String,
        /// Indexed value.
        value: String,
    },
    /// Drops every entry of an index.
    Clear {
        /// Index to clear.
        index: IndexIdentifier,
    },
}

impl Command {
    /// Builds an add for a node index.
    ///
    /// Relationship indexes need endpoint ids; use [`Command::add_relationship`].
    pub fn add(
        index: IndexIdentifier,
        entity_id: i64,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self> {
        if index.entity_kind() != EntityKind::Node {
            return Err(IndexLogError::Invalid(
                "add on a relationship index requires endpoint ids",
            ));
        }
        Ok(Command::Add {
            index,
            entity_id,
            key: key.into(),
            value: value.into(),
        })
    }

    /// Builds an add for a relationship index.
    pub fn add_relationship(
        index: IndexIdentifier,
        entity_id: i64,
        key: impl Into<String>,
        value: impl Into<String>,
        start_node_id: i64,
        end_node_id: i64,
    ) -> Result<Self> {
        if index.entity_kind() != EntityKind::Relationship {
            return Err(IndexLogError::Invalid(
                "add_relationship requires a relationship index",
            ));
        }
        Ok(Command::AddRelationship {
            index,
            entity_id,
            key: key.into(),
            value: value.into(),
            start_node_id,
            end_node_id,
        })
    }

    /// Builds a removal.
    pub fn remove(
        index: IndexIdentifier,
        entity_id: i64,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Command::Remove {
            index,
            entity_id,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds a clear of the whole index.
    pub fn clear(index: IndexIdentifier) -> Self {
        Command::Clear { index }
    }

    /// Returns the variant discriminant.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Add { .. } => CommandKind::Add,
            Command::AddRelationship { .. } => CommandKind::AddRelationship,
            Command::Remove { .. } => CommandKind::Remove,
            Command::Clear { .. } => CommandKind::Clear,
        }
    }

    /// Index the command targets.
    pub fn index(&self) -> &IndexIdentifier {
        match self {
            Command::Add { index, .. }
            | Command::AddRelationship { index, .. }
            | Command::Remove { index, .. }
            | Command::Clear { index } => index,
        }
    }

    /// Affected entity, or [`CLEAR_ENTITY_ID`] for a clear.
    pub fn entity_id(&self) -> i64 {
        match self {
            Command::Add { entity_id, .. }
            | Command::AddRelationship { entity_id, .. }
            | Command::Remove { entity_id, .. } => *entity_id,
            Command::Clear { .. } => CLEAR_ENTITY_ID,
        }
    }

    /// Property key; empty for a clear.
    pub fn key(&self) -> &str {
        match self {
            Command::Add { key, .. }
            | Command::AddRelationship { key, .. }
            | Command::Remove { key, .. } => key,
            Command::Clear { .. } => "",
        }
    }

    /// Indexed value; empty for a clear.
    pub fn value(&self) -> &str {
        match self {
            Command::Add { value, .. }
            | Command::AddRelationship { value, .. }
            | Command::Remove { value, .. } => value,
            Command::Clear { .. } => "",
        }
    }

    /// Relationship endpoints `(start, end)`, present only on `AddRelationship`.
    pub fn endpoints(&self) -> Option<(i64, i64)> {
        match self {
            Command::AddRelationship {
                start_node_id,
                end_node_id,
                ..
            } => Some((*start_node_id, *end_node_id)),
            Command::Add { .. } | Command::Remove { .. } | Command::Clear { .. } => None,
        }
    }
}
