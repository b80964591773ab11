//! Errors surfaced at the embedding-API boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("no global function named {0:?}")]
    UnknownGlobalFunction(String),

    #[error("{0:?} is not a function")]
    NotCallable(String),

    #[error(transparent)]
    Format(#[from] gm_format::FormatError),

    #[error(transparent)]
    Sched(#[from] gm_sched::SchedError),
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
