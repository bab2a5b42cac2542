//! Error types for lumen-common.

use thiserror::Error;

/// Common error type for Lumen operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer at offset {offset:#x}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// An absolute offset or range fell outside the buffer.
    #[error("range {offset:#x}+{length:#x} is out of bounds for a buffer of {bound:#x} bytes")]
    OutOfRange {
        offset: usize,
        length: usize,
        bound: usize,
    },

    /// Invalid magic bytes encountered.
    #[error("invalid magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// A writer was handed a stream it does not own, or a similar caller mistake.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An indexed list already holds an item with this key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Missing null terminator in string.
    #[error("string at offset {0:#x} is missing its null terminator")]
    MissingNullTerminator(usize),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
