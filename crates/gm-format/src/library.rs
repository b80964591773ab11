//! The decoded-but-not-yet-fixed-up representation of a compiled library:
//! what [`crate::codec::decode`] produces and [`crate::codec::encode`]
//! consumes. String and function-id references are still raw table offsets
//! and ids at this stage; [`crate::fixup::load`] resolves them into heap
//! handles.

use gm_io::Endian;

/// Per-function debug info, present only when the library carries debug
/// info (gated by the library-wide flag, not per function).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionDebugInfo {
    pub debug_name_str_off: u32,
    /// (bytecode address, source line) pairs, ascending by address.
    pub lines: Vec<(u32, u32)>,
    /// One string-table offset per parameter then per local, in declaration
    /// order.
    pub sym_str_offs: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    pub id: u32,
    pub is_root: bool,
    pub num_params: u32,
    pub num_locals: u32,
    pub max_stack: u32,
    /// Raw bytecode as written by the compiler: string/function operands
    /// are still table offsets/ids, and multi-byte operands are still in
    /// the library's declared byte order.
    pub bytecode: Vec<u8>,
    pub debug: Option<FunctionDebugInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledLibrary {
    /// Concatenated NUL-terminated strings; a string's "offset" elsewhere in
    /// this struct is its start index into this blob.
    pub strings: Vec<u8>,
    pub source: Option<Vec<u8>>,
    pub functions: Vec<CompiledFunction>,
    /// Byte order the raw bytecode's 4-byte operands are still encoded in.
    /// `encode` always normalises output to its `endian` argument, but
    /// bytecode operands aren't decoded eagerly, so `load` needs this to
    /// interpret them correctly during fixup.
    pub source_endian: Endian,
}

impl CompiledLibrary {
    pub fn has_debug_info(&self) -> bool {
        self.source.is_some() || self.functions.iter().any(|f| f.debug.is_some())
    }
}
