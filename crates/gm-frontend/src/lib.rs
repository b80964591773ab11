//! A deliberately small compiler frontend: a lexer, a recursive-descent
//! parser and a codegen pass that together turn a subset of the scripting
//! language's surface syntax (globals, locals, functions, `if`/`while`,
//! arithmetic and calls) into a [`gm_format::CompiledLibrary`] that
//! `gm-format::load` and `gm-vm` can run unmodified.
//!
//! This is not a full-grammar compiler — there is no table-literal syntax,
//! no dot/index member access, no closures and no nested function
//! declarations. It exists so the runtime has something to compile and run
//! end to end without requiring a hand-assembled library.

mod ast;
mod codegen;
mod error;
mod lexer;
mod parser;

pub use error::CompileError;
use gm_format::CompiledLibrary;
use gm_io::Endian;

/// Compiles `source` into a library encoded for `endian`. On success, the
/// returned library's `source_endian` is set to `endian`, so passing it
/// straight to [`gm_format::encode`] with the same `endian` round-trips.
pub fn compile(source: &str, endian: Endian) -> Result<CompiledLibrary, Vec<CompileError>> {
    let program = parser::parse(source)?;
    Ok(codegen::compile_program(&program, source, endian))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_global_declaration_and_return() {
        let lib = compile("global x = 3 + 4; return x;", Endian::Little).unwrap();
        assert_eq!(lib.functions.len(), 1);
        assert!(lib.functions[0].is_root);
    }

    #[test]
    fn reports_a_compile_error_without_panicking() {
        let errs = compile("global = ;", Endian::Little).unwrap_err();
        assert!(!errs.is_empty());
    }

    #[test]
    fn big_endian_target_is_recorded_on_the_library() {
        let lib = compile("return null;", Endian::Big).unwrap();
        assert_eq!(lib.source_endian, Endian::Big);
    }
}
