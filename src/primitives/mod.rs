//! Low-level wire primitives shared by every index command.
//!
//! Writing goes through the [`bytes::LogBuffer`] append target; reading goes
//! through a forward-only channel and an [`io::ScratchBuffer`].

/// Append-side encoding of integers and character sequences.
pub mod bytes;

/// Read-side decoding with truncation detection.
pub mod io;
