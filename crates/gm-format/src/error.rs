//! Errors from reading, writing, or fixing up a compiled library.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("not a gml0 library: bad magic bytes {0:?}")]
    BadMagic([u8; 4]),

    #[error("malformed library: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] gm_io::IoError),
}

pub type FormatResult<T> = std::result::Result<T, FormatError>;
