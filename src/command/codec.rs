//! Byte layout of one command record.
//!
//! ```text
//! type u8 | kind u8 | name_len i32 | entity_id i64 | key_len i32 | value_len i32
//! name [u16; name_len] | key [u16; key_len] | value [u16; value_len]
//! start_node_id i64 | end_node_id i64        (type = add, kind = relationship only)
//! ```
//!
//! Integers are big-endian, lengths count UTF-16 code units. A record that
//! ends early decodes as "no command"; only a fully read record with an
//! unknown type byte is fatal.

use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::Command;
use crate::index::{EntityKind, IndexIdentifier, IndexStore};
use crate::primitives::bytes::{char_len, chars_wire_len, LogBuffer};
use crate::primitives::io::ScratchBuffer;
use crate::types::{IndexLogError, Result};

/// Type byte for [`Command::Add`] and [`Command::AddRelationship`].
pub const ADD_COMMAND: u8 = 1;
/// Type byte for [`Command::Remove`].
pub const REMOVE_COMMAND: u8 = 2;
/// Type byte for [`Command::Clear`].
pub const CLEAR_COMMAND: u8 = 3;

/// Entity kind, three length fields and the entity id following the type byte.
pub const FIXED_HEADER_LEN: usize = 1 + 4 + 8 + 4 + 4;
/// Endpoint ids trailing a relationship add.
pub const RELATIONSHIP_TAIL_LEN: usize = 8 + 8;

/// How the decoder treats an entity kind byte that is neither node nor relationship.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKindPolicy {
    /// Stop decoding as if the log ended there.
    #[default]
    EndOfLog,
    /// Fail with [`IndexLogError::UnknownEntityKind`].
    Corruption,
}

/// Why decoding stopped without producing another command.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The channel ended on a record boundary.
    #[default]
    EndOfChannel,
    /// The channel ended inside a record.
    Truncated,
    /// A complete record header carried this entity kind byte and
    /// [`EntityKindPolicy::EndOfLog`] was in effect. The bytes from that
    /// record on were not decoded and may hold further complete records.
    UnknownEntityKind(u8),
}

enum Decoded {
    Command(Command),
    Stopped(StopReason),
}

/// Knobs for [`CommandReader`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
    /// Handling of out-of-range entity kind bytes.
    pub entity_kind_policy: EntityKindPolicy,
}

/// Appends `command` to `buf`.
///
/// Fails without writing anything if the variant does not match the entity
/// kind of its index or a string is too long for its length field.
pub fn encode<B: LogBuffer + ?Sized>(command: &Command, buf: &mut B) -> Result<()> {
    let index = command.index();
    match (command, index.entity_kind()) {
        (Command::Add { .. }, EntityKind::Relationship) => {
            return Err(IndexLogError::Invalid(
                "add command targets a relationship index",
            ));
        }
        (Command::AddRelationship { .. }, EntityKind::Node) => {
            return Err(IndexLogError::Invalid(
                "add_relationship command targets a node index",
            ));
        }
        _ => {}
    }
    let name_len = char_len(index.name())?;
    let key_len = char_len(command.key())?;
    let value_len = char_len(command.value())?;

    buf.put_u8(command.kind().type_byte())?;
    buf.put_u8(index.entity_kind().to_byte())?;
    buf.put_i32(name_len)?;
    buf.put_i64(command.entity_id())?;
    buf.put_i32(key_len)?;
    buf.put_i32(value_len)?;
    buf.put_chars(index.name())?;
    buf.put_chars(command.key())?;
    buf.put_chars(command.value())?;
    if let Some((start_node_id, end_node_id)) = command.endpoints() {
        buf.put_i64(start_node_id)?;
        buf.put_i64(end_node_id)?;
    }
    Ok(())
}

/// Number of bytes [`encode`] appends for `command`.
pub fn encoded_len(command: &Command) -> usize {
    let tail = if command.endpoints().is_some() {
        RELATIONSHIP_TAIL_LEN
    } else {
        0
    };
    1 + FIXED_HEADER_LEN
        + chars_wire_len(command.index().name())
        + chars_wire_len(command.key())
        + chars_wire_len(command.value())
        + tail
}

/// Decodes the next command from `channel` with default options.
///
/// `Ok(None)` means no complete command remains: the channel is exhausted
/// or ends inside a partially written record.
pub fn decode_next<R: Read + ?Sized>(
    channel: &mut R,
    scratch: &mut ScratchBuffer,
    store: &dyn IndexStore,
) -> Result<Option<Command>> {
    match read_command(channel, scratch, store, &DecodeOptions::default())? {
        Decoded::Command(command) => Ok(Some(command)),
        Decoded::Stopped(_) => Ok(None),
    }
}

fn read_command<R: Read + ?Sized>(
    channel: &mut R,
    scratch: &mut ScratchBuffer,
    store: &dyn IndexStore,
    options: &DecodeOptions,
) -> Result<Decoded> {
    let Some(command_type) = scratch.read_u8(channel)? else {
        return Ok(Decoded::Stopped(StopReason::EndOfChannel));
    };

    let Some(fixed) = scratch.read_exact(channel, FIXED_HEADER_LEN)? else {
        trace!(command_type, "index command header truncated");
        return Ok(Decoded::Stopped(StopReason::Truncated));
    };
    let kind_byte = fixed[0];
    let name_len = be_i32(&fixed[1..5]);
    let entity_id = be_i64(&fixed[5..13]);
    let key_len = be_i32(&fixed[13..17]);
    let value_len = be_i32(&fixed[17..21]);

    let Some(entity_kind) = EntityKind::from_byte(kind_byte) else {
        return match options.entity_kind_policy {
            EntityKindPolicy::EndOfLog => {
                warn!(
                    command_type,
                    entity_kind = kind_byte,
                    "unknown entity kind in index command; treating as end of log"
                );
                Ok(Decoded::Stopped(StopReason::UnknownEntityKind(kind_byte)))
            }
            EntityKindPolicy::Corruption => Err(IndexLogError::UnknownEntityKind(kind_byte)),
        };
    };

    let name_len = char_count("index name", name_len)?;
    let key_len = char_count("key", key_len)?;
    let value_len = char_count("value", value_len)?;

    let Some(name) = scratch.read_string(channel, name_len)? else {
        return Ok(Decoded::Stopped(StopReason::Truncated));
    };
    let Some(key) = scratch.read_string(channel, key_len)? else {
        return Ok(Decoded::Stopped(StopReason::Truncated));
    };
    let Some(value) = scratch.read_string(channel, value_len)? else {
        return Ok(Decoded::Stopped(StopReason::Truncated));
    };

    let endpoints = if command_type == ADD_COMMAND && entity_kind == EntityKind::Relationship {
        let Some(start_node_id) = scratch.read_i64(channel)? else {
            return Ok(Decoded::Stopped(StopReason::Truncated));
        };
        let Some(end_node_id) = scratch.read_i64(channel)? else {
            return Ok(Decoded::Stopped(StopReason::Truncated));
        };
        Some((start_node_id, end_node_id))
    } else {
        None
    };

    let index = IndexIdentifier::resolve(entity_kind, &name, store);
    let command = match command_type {
        ADD_COMMAND => match endpoints {
            Some((start_node_id, end_node_id)) => Command::AddRelationship {
                index,
                entity_id,
                key,
                value,
                start_node_id,
                end_node_id,
            },
            None => Command::Add {
                index,
                entity_id,
                key,
                value,
            },
        },
        REMOVE_COMMAND => Command::Remove {
            index,
            entity_id,
            key,
            value,
        },
        CLEAR_COMMAND => Command::Clear { index },
        other => return Err(IndexLogError::UnknownCommandType(other)),
    };
    trace!(
        kind = command.kind().as_str(),
        index = %command.index(),
        entity_id,
        "decoded index command"
    );
    Ok(Decoded::Command(command))
}

fn char_count(field: &'static str, len: i32) -> Result<usize> {
    usize::try_from(len).map_err(|_| IndexLogError::InvalidLength { field, len })
}

fn be_i32(src: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&src[..4]);
    i32::from_be_bytes(raw)
}

fn be_i64(src: &[u8]) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&src[..8]);
    i64::from_be_bytes(raw)
}

/// Forward-only reader yielding commands from a log channel.
///
/// Owns the scratch buffer for the whole pass. Once a read reports the end of
/// the log, or fails, the reader stays finished.
pub struct CommandReader<'s, R> {
    channel: R,
    scratch: ScratchBuffer,
    store: &'s dyn IndexStore,
    options: DecodeOptions,
    finished: bool,
    stop_reason: Option<StopReason>,
}

impl<'s, R: Read> CommandReader<'s, R> {
    /// Creates a reader with the default scratch capacity and options.
    pub fn new(channel: R, store: &'s dyn IndexStore) -> Self {
        Self::with_options(channel, store, ScratchBuffer::default(), DecodeOptions::default())
    }

    /// Creates a reader with an explicit scratch buffer and options.
    pub fn with_options(
        channel: R,
        store: &'s dyn IndexStore,
        scratch: ScratchBuffer,
        options: DecodeOptions,
    ) -> Self {
        Self {
            channel,
            scratch,
            store,
            options,
            finished: false,
            stop_reason: None,
        }
    }

    /// Reads the next complete command, or `None` at the end of the log.
    pub fn read_command(&mut self) -> Result<Option<Command>> {
        if self.finished {
            return Ok(None);
        }
        match read_command(&mut self.channel, &mut self.scratch, self.store, &self.options) {
            Ok(Decoded::Command(command)) => Ok(Some(command)),
            Ok(Decoded::Stopped(reason)) => {
                self.finished = true;
                self.stop_reason = Some(reason);
                Ok(None)
            }
            Err(err) => {
                self.finished = true;
                Err(err)
            }
        }
    }

    /// Why the reader stopped, once it has returned `None`.
    ///
    /// Stays `None` while commands remain and after a failed read.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Returns true once the end of the log or an error has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Borrows the underlying channel.
    pub fn get_ref(&self) -> &R {
        &self.channel
    }

    /// Returns the underlying channel.
    pub fn into_inner(self) -> R {
        self.channel
    }
}

impl<R: Read> Iterator for CommandReader<'_, R> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_command().transpose()
    }
}
