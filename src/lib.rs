//! Index command log for the Sombra graph database.
//!
//! Index mutations (node adds, relationship adds, removals and clears) are
//! appended to a command log as compact big-endian records and replayed into
//! the live indexes after a crash. [`command`] holds the record model and
//! codec, [`log`] the on-disk file with its writer and recovery pass, and
//! [`replay`] the driver that feeds decoded commands to an applier.

pub mod command;
pub mod config;
pub mod index;
pub mod log;
pub mod logging;
pub mod primitives;
pub mod replay;
pub mod types;

pub use command::{decode_next, encode, Command, CommandKind, CommandReader, EntityKindPolicy};
pub use config::{ConfigError, IndexLogConfig};
pub use index::{EntityKind, IndexConfig, IndexIdentifier, IndexStore, MemoryIndexStore};
pub use log::{recover, CommandLogWriter, LogWriterOptions, RecoveryReport, WriterStats};
pub use replay::{replay, CommandApplier, MemoryIndex, RecoveryOptions, ReplayStats};
pub use types::{IndexLogError, Result};
