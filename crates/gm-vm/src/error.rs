//! VM runtime errors.
//!
//! These are the typed exceptions a thread can raise; raising one aborts the
//! thread (there is no language-level try/catch) rather than unwinding
//! through Rust's own error handling.

use gm_value::OpCode;
use gm_value::VariantType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    #[error("opcode {op:?} has no registered handler")]
    UnimplementedOpcode { op: OpCode },

    #[error("stack overflow: thread stack exceeded its {cap} byte cap")]
    StackOverflow { cap: usize },

    #[error("stack underflow: popped an empty operand stack")]
    StackUnderflow,

    #[error("type mismatch: expected {expected}, found {found:?}")]
    TypeMismatch { expected: &'static str, found: VariantType },

    #[error("no operator overload registered for {op:?} on user kind {kind}")]
    NoOperatorOverload { op: OpCode, kind: u32 },

    #[error("key not found")]
    KeyNotFound,

    #[error("call target is not callable")]
    NotCallable,

    #[error("division by zero")]
    DivisionByZero,

    #[error("frame stack underflow: returned with no caller frame")]
    FrameUnderflow,
}

pub type VmResult<T> = std::result::Result<T, VmError>;
