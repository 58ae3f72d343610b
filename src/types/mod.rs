#![forbid(unsafe_code)]
//! Shared error type and result alias for the index command log.

/// Errors raised while encoding, decoding or persisting index commands.
///
/// A truncated trailing record is never reported through this type; decoders
/// signal it with `Ok(None)`.
#[derive(thiserror::Error, Debug)]
pub enum IndexLogError {
    /// Underlying channel or file failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Structurally invalid log contents.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller supplied a value the protocol cannot represent.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// A fully read record carried a command type byte outside `1..=3`.
    #[error("unknown command type[{0}]")]
    UnknownCommandType(u8),
    /// A record carried an entity kind byte other than node or relationship.
    #[error("unknown entity kind[{0}]")]
    UnknownEntityKind(u8),
    /// A length prefix that cannot describe a character sequence.
    #[error("invalid {field} length {len}")]
    InvalidLength {
        /// Field whose length prefix was rejected.
        field: &'static str,
        /// Raw length value read from the log.
        len: i32,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IndexLogError>;

impl IndexLogError {
    /// Returns true for errors that indicate a damaged log rather than a
    /// failing device or a caller bug.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            IndexLogError::Corruption(_)
                | IndexLogError::UnknownCommandType(_)
                | IndexLogError::UnknownEntityKind(_)
                | IndexLogError::InvalidLength { .. }
        )
    }
}
