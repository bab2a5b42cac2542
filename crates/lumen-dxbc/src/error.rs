//! Error types for DXBC parsing and writing.

use thiserror::Error;

use crate::FourCC;

/// Errors that can occur when working with DXBC containers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] lumen_common::Error),

    /// Container major version other than 1.
    #[error("unsupported DXBC container version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// Declared container size exceeds the buffer.
    #[error("invalid DXBC size: buffer length {actual:#x}, but header says {declared:#x}")]
    SizeMismatch { declared: usize, actual: usize },

    /// Stored digest does not match the recomputed one.
    #[error("DXBC digest mismatch: stored {stored}, computed {computed}")]
    DigestMismatch { stored: String, computed: String },

    /// Two parts with the same tag.
    #[error("duplicate DXBC part {0}")]
    DuplicatePart(FourCC),

    /// A part required by the caller is absent.
    #[error("missing DXBC part {0}")]
    MissingPart(&'static str),

    /// Structurally invalid part or token stream.
    #[error("malformed {context}: {message}")]
    Malformed {
        context: &'static str,
        message: String,
    },

    /// A reference cycle between RDEF variable types.
    #[error("variable type {0} refers to itself")]
    TypeCycle(usize),
}

impl Error {
    pub(crate) fn malformed(context: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            context,
            message: message.into(),
        }
    }
}

/// Result type for DXBC operations.
pub type Result<T> = std::result::Result<T, Error>;
