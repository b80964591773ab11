//! Errors raised while decoding/encoding debug protocol messages.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebugError {
    #[error("unknown command tag {0:?}")]
    UnknownTag([u8; 4]),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] gm_io::IoError),
}

pub type DebugResult<T> = std::result::Result<T, DebugError>;
