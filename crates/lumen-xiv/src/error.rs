//! Error types for ShCd and ShPk parsing and editing.

use thiserror::Error;

/// Errors that can occur when working with shaders and shader packages.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] lumen_common::Error),

    /// Error from the embedded DXBC container.
    #[error("DXBC: {0}")]
    Dxbc(#[from] lumen_dxbc::Error),

    /// Header version this crate cannot lay out.
    #[error("unrecognized {format} version {version:#010X}")]
    UnsupportedVersion { format: &'static str, version: u32 },

    /// Graphics platform tag other than DX9 or DX11.
    #[error("unrecognized {format} graphics platform {tag:#010X}")]
    UnknownPlatform { format: &'static str, tag: u32 },

    /// Program type outside the known range.
    #[error("unrecognized program type {0:#04X}")]
    UnknownProgramType(u32),

    /// Declared file size exceeds the buffer.
    #[error("invalid {format} file size: buffer length {actual:#x}, but header says {declared:#x}")]
    SizeMismatch {
        format: &'static str,
        declared: usize,
        actual: usize,
    },

    /// Structurally invalid data, such as a reserved field that is not zero.
    #[error("malformed {context}: {message}")]
    Malformed {
        context: &'static str,
        message: String,
    },

    /// Valid data this crate has no support for.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A DXBC part needed to build a shader is absent or not of the expected type.
    #[error("missing or mistyped {0} part")]
    MissingPart(&'static str),

    /// A caller handed in an index, name or value that cannot be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn malformed(context: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            context,
            message: message.into(),
        }
    }
}

/// Result type for shader and shader package operations.
pub type Result<T> = std::result::Result<T, Error>;
