//! Compile-time diagnostics. Accumulated into the machine log at the
//! embedding boundary rather than ever reaching the VM.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct CompileError {
    pub line: u32,
    pub message: String,
}

impl CompileError {
    pub fn new(line: u32, message: String) -> Self {
        Self { line, message }
    }
}
