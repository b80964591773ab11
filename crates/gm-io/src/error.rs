//! Error types for the `gm-io` crate.

use thiserror::Error;

/// Errors raised while reading or writing the compiled library format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// A read ran past the end of the buffer.
    #[error("unexpected end of stream: wanted {expected} more bytes while reading {context}")]
    EndOfStream { expected: usize, context: String },

    /// A write exceeded the writer's declared capacity.
    #[error("buffer overflow: attempted to write {attempted} bytes, capacity {capacity}")]
    BufferOverflow { attempted: usize, capacity: usize },

    /// A byte sequence wasn't valid UTF-8 where a string was expected.
    #[error("invalid UTF-8 string while reading {context}: {reason}")]
    InvalidString { context: String, reason: String },

    /// A seek or skip moved outside the buffer's bounds.
    #[error("position {position} is out of bounds for a buffer of length {len}")]
    OutOfBounds { position: usize, len: usize },

    /// A format tag or magic number didn't match what was expected.
    #[error("invalid format: expected {expected}, found {found}")]
    InvalidFormat { expected: String, found: String },
}

/// Result type for `gm-io` operations.
pub type IoResult<T> = std::result::Result<T, IoError>;

impl IoError {
    pub fn end_of_stream<S: Into<String>>(expected: usize, context: S) -> Self {
        Self::EndOfStream {
            expected,
            context: context.into(),
        }
    }

    pub fn invalid_string<S: Into<String>, R: Into<String>>(context: S, reason: R) -> Self {
        Self::InvalidString {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
