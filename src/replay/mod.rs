#![forbid(unsafe_code)]
//! Replay driver feeding decoded commands to whoever applies them.

mod memory;

pub use memory::{IndexEntries, IndexSummary, MemoryIndex};

use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{
    Command, CommandKind, CommandReader, DecodeOptions, EntityKindPolicy, StopReason,
};
use crate::index::IndexStore;
use crate::primitives::io::{CountingReader, ScratchBuffer, DEFAULT_SCRATCH_CAPACITY};
use crate::types::Result;

/// Applies one decoded command to the live index.
///
/// Called once per command, in log order. An error aborts the replay.
pub trait CommandApplier {
    /// Applies `command`.
    fn apply(&mut self, command: Command) -> Result<()>;
}

impl<F> CommandApplier for F
where
    F: FnMut(Command) -> Result<()>,
{
    fn apply(&mut self, command: Command) -> Result<()> {
        self(command)
    }
}

/// Options for a recovery pass.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryOptions {
    /// Scratch buffer size used to stream character sequences; clamped to
    /// [`MAX_SCRATCH_CAPACITY`](crate::primitives::io::MAX_SCRATCH_CAPACITY).
    pub scratch_capacity: usize,
    /// Handling of out-of-range entity kind bytes.
    pub entity_kind_policy: EntityKindPolicy,
    /// Cut a partial trailing record off the log file after recovery.
    pub truncate_tail: bool,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            entity_kind_policy: EntityKindPolicy::default(),
            truncate_tail: true,
        }
    }
}

impl RecoveryOptions {
    /// Same options without touching the file; for inspection.
    pub fn read_only(mut self) -> Self {
        self.truncate_tail = false;
        self
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            entity_kind_policy: self.entity_kind_policy,
        }
    }
}

/// Outcome of a replay pass.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReplayStats {
    /// Commands applied.
    pub commands: u64,
    /// Node adds applied.
    pub adds: u64,
    /// Relationship adds applied.
    pub relationship_adds: u64,
    /// Removals applied.
    pub removes: u64,
    /// Clears applied.
    pub clears: u64,
    /// Bytes up to the end of the last complete command.
    pub bytes_consumed: u64,
    /// Bytes read in total, including any partial trailing record.
    pub bytes_read: u64,
    /// Why decoding ended.
    pub stop: StopReason,
}

impl ReplayStats {
    fn record(&mut self, kind: CommandKind) {
        self.commands += 1;
        match kind {
            CommandKind::Add => self.adds += 1,
            CommandKind::AddRelationship => self.relationship_adds += 1,
            CommandKind::Remove => self.removes += 1,
            CommandKind::Clear => self.clears += 1,
        }
    }
}

/// Decodes every complete command from `channel` and applies it in order.
///
/// Stops successfully at the end of the channel or at a partial trailing
/// record. Corruption and applier errors propagate.
pub fn replay<R, A>(
    channel: R,
    store: &dyn IndexStore,
    options: &RecoveryOptions,
    applier: &mut A,
) -> Result<ReplayStats>
where
    R: Read,
    A: CommandApplier + ?Sized,
{
    let mut reader = CommandReader::with_options(
        CountingReader::new(channel, 0),
        store,
        ScratchBuffer::with_capacity(options.scratch_capacity),
        options.decode_options(),
    );
    let mut stats = ReplayStats::default();
    while let Some(command) = reader.read_command()? {
        stats.record(command.kind());
        applier.apply(command)?;
        stats.bytes_consumed = reader.get_ref().position();
    }
    stats.bytes_read = reader.get_ref().position();
    stats.stop = reader.stop_reason().unwrap_or_default();
    debug!(
        commands = stats.commands,
        stop = ?stats.stop,
        bytes_consumed = stats.bytes_consumed,
        bytes_read = stats.bytes_read,
        "index command replay finished"
    );
    Ok(stats)
}
