#![forbid(unsafe_code)]
//! Index identifiers and the index-store lookup they are resolved through.

mod identifier;
mod store;

pub use identifier::{EntityKind, IndexIdentifier};
pub use store::{IndexConfig, IndexStore, MemoryIndexStore};
