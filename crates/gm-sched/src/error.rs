//! Errors raised when handing a thread to the scheduler.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedError {
    #[error("spawn target is not a script function")]
    NotAScriptFunction,

    #[error(transparent)]
    Vm(#[from] gm_vm::VmError),
}

pub type SchedResult<T> = std::result::Result<T, SchedError>;
