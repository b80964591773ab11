//! Load-time fixup: resolves the raw string-table offsets and function ids
//! a decoded [`CompiledLibrary`]'s bytecode carries into live heap handles.
//!
//! GC is disabled for the whole walk via [`gm_gc::DisableGuard`] so a
//! function allocated in the first pass (with still-unfixed bytecode, and
//! thus no tracked string/function children yet) can't be swept before the
//! second pass finishes wiring it up.

use crate::error::{FormatError, FormatResult};
use crate::library::CompiledLibrary;
use gm_gc::{Collector, DisableGuard};
use gm_value::{FunctionObject, Handle, LineEntry, Object, ScriptFunction};
use gm_vm::OpCode;
use std::collections::HashMap;
use std::sync::Arc;

/// The result of fixing up a library: every compiled function's handle, in
/// declaration order, plus the root (entry) function if one is flagged.
pub struct LoadedLibrary {
    pub functions: Vec<Handle>,
    pub root: Option<Handle>,
}

/// Opcodes whose operand is a string-table offset, rewritten to an interned
/// string handle's raw index.
fn is_string_operand(op: OpCode) -> bool {
    matches!(
        op,
        OpCode::PushStr | OpCode::GetGlobal | OpCode::SetGlobal | OpCode::GetDot | OpCode::SetDot | OpCode::GetThis | OpCode::SetThis
    )
}

fn intern_all_strings(gc: &mut Collector, blob: &[u8]) -> HashMap<u32, Handle> {
    let mut map = HashMap::new();
    let mut pos = 0usize;
    while pos < blob.len() {
        let end = blob[pos..].iter().position(|&b| b == 0).map(|i| pos + i).unwrap_or(blob.len());
        let handle = gc.intern_string(&blob[pos..end]);
        map.insert(pos as u32, handle);
        pos = end + 1;
    }
    map
}

/// Rewrites one function's bytecode in place: every 4-byte operand is
/// normalised to little-endian, and string/function operands are replaced
/// with the corresponding handle's raw index.
fn fix_up_bytecode(
    raw: &[u8],
    source_endian: gm_io::Endian,
    strings: &HashMap<u32, Handle>,
    function_ids: &HashMap<u32, Handle>,
) -> FormatResult<Vec<u8>> {
    let mut out = raw.to_vec();
    let mut address = 0usize;
    while address < out.len() {
        let op = OpCode::from_u8(out[address])
            .ok_or_else(|| FormatError::Malformed(format!("unknown opcode byte {} at address {address}", out[address])))?;
        let operand_size = op.operand_size();
        if operand_size == 4 {
            let start = address + 1;
            let end = start + 4;
            let raw_bytes: [u8; 4] = out
                .get(start..end)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| FormatError::Malformed(format!("truncated operand at address {address}")))?;
            let raw_value = match source_endian {
                gm_io::Endian::Little => u32::from_le_bytes(raw_bytes),
                gm_io::Endian::Big => u32::from_be_bytes(raw_bytes),
            };

            let fixed = if is_string_operand(op) {
                strings
                    .get(&raw_value)
                    .ok_or_else(|| FormatError::Malformed(format!("string offset {raw_value} has no matching entry")))?
                    .index()
            } else if op == OpCode::PushFn {
                function_ids
                    .get(&raw_value)
                    .ok_or_else(|| FormatError::Malformed(format!("function id {raw_value} not found in this library")))?
                    .index()
            } else {
                raw_value
            };

            out[start..end].copy_from_slice(&fixed.to_le_bytes());
        }
        address += 1 + operand_size;
    }
    Ok(out)
}

pub fn load(lib: &CompiledLibrary, gc: &mut Collector, source_id: u32) -> FormatResult<LoadedLibrary> {
    let mut guard = DisableGuard::new(gc);
    let gc = guard.collector_mut();

    let strings = intern_all_strings(gc, &lib.strings);

    // Pass 1: allocate every function with unfixed bytecode so forward and
    // mutually-recursive `PUSH_FN` references have a handle to resolve to.
    let mut function_ids = HashMap::new();
    let mut handles = Vec::with_capacity(lib.functions.len());
    for f in &lib.functions {
        let debug_name = f.debug.as_ref().map(|d| {
            strings
                .get(&d.debug_name_str_off)
                .copied()
                .unwrap_or_else(|| gc.intern_string(b""))
        });
        let lines: Vec<LineEntry> = f
            .debug
            .as_ref()
            .map(|d| d.lines.iter().map(|&(address, line)| LineEntry { address, line }).collect())
            .unwrap_or_default();
        let symbols: FormatResult<Vec<Handle>> = f
            .debug
            .as_ref()
            .map(|d| {
                d.sym_str_offs
                    .iter()
                    .map(|off| {
                        strings
                            .get(off)
                            .copied()
                            .ok_or_else(|| FormatError::Malformed(format!("symbol string offset {off} has no matching entry")))
                    })
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()));
        let symbols = symbols?;

        let handle = gc.alloc_function_script(ScriptFunction {
            bytecode: Arc::from(f.bytecode.clone()),
            num_params: f.num_params,
            num_locals: f.num_locals,
            max_stack: f.max_stack,
            source_id,
            is_root: f.is_root,
            debug_name,
            lines: Arc::from(lines),
            symbols: Arc::from(symbols),
        });
        function_ids.insert(f.id, handle);
        handles.push(handle);
    }

    // Pass 2: now that every function id has a handle, rewrite each
    // function's bytecode operands in place.
    let mut root = None;
    for (f, &handle) in lib.functions.iter().zip(handles.iter()) {
        let fixed = fix_up_bytecode(&f.bytecode, lib.source_endian, &strings, &function_ids)?;
        match gc.heap_mut().get_mut(handle) {
            Some(Object::Function(FunctionObject::Script(script))) => script.bytecode = Arc::from(fixed),
            _ => unreachable!("handle was just allocated as a script function"),
        }
        if f.is_root {
            root = Some(handle);
        }
    }

    Ok(LoadedLibrary { functions: handles, root })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{CompiledFunction, FunctionDebugInfo};
    use gm_gc::GcConfig;
    use gm_value::Variant;
    use gm_vm::{JumpTable, OperatorRegistry, Thread};

    fn push_str_bytecode(offset: u32) -> Vec<u8> {
        let mut bc = vec![OpCode::PushStr as u8];
        bc.extend_from_slice(&offset.to_le_bytes());
        bc.push(OpCode::Return as u8);
        bc
    }

    #[test]
    fn rewrites_a_string_offset_into_an_interned_handle() {
        let lib = CompiledLibrary {
            strings: b"hello\0".to_vec(),
            source: None,
            functions: vec![CompiledFunction {
                id: 0,
                is_root: true,
                num_params: 0,
                num_locals: 0,
                max_stack: 4,
                bytecode: push_str_bytecode(0),
                debug: None,
            }],
            source_endian: gm_io::Endian::Little,
        };
        let mut gc = Collector::new(GcConfig::default());
        let loaded = load(&lib, &mut gc, 0).unwrap();
        let root = loaded.root.unwrap();

        let globals = gc.alloc_table();
        let operators = OperatorRegistry::new();
        let table = JumpTable::with_default_handlers();
        let mut thread = Thread::new(1, 256, 4096);
        thread.push_frame(gm_vm::CallFrame {
            return_address: 0,
            base: 0,
            function: root,
            this_value: Variant::Null,
        });

        let outcome = gm_vm::run_thread(&mut gc, globals, &operators, &table, &mut thread, 16).unwrap();
        match outcome {
            gm_vm::RunOutcome::Returned(Variant::String(h)) => {
                assert_eq!(&gc.heap().get(h).unwrap().as_string().unwrap().bytes[..], b"hello");
            }
            other => panic!("expected a returned string, got {other:?}"),
        }
    }

    #[test]
    fn mutually_recursive_push_fn_resolves_forward_references() {
        let lib = CompiledLibrary {
            strings: Vec::new(),
            source: None,
            functions: vec![
                CompiledFunction {
                    id: 0,
                    is_root: true,
                    num_params: 0,
                    num_locals: 0,
                    max_stack: 4,
                    bytecode: {
                        let mut bc = vec![OpCode::PushFn as u8];
                        bc.extend_from_slice(&1u32.to_le_bytes());
                        bc.push(OpCode::Return as u8);
                        bc
                    },
                    debug: None,
                },
                CompiledFunction {
                    id: 1,
                    is_root: false,
                    num_params: 0,
                    num_locals: 0,
                    max_stack: 4,
                    bytecode: vec![OpCode::PushNull as u8, OpCode::Return as u8],
                    debug: None,
                },
            ],
            source_endian: gm_io::Endian::Little,
        };
        let mut gc = Collector::new(GcConfig::default());
        let loaded = load(&lib, &mut gc, 0).unwrap();
        assert_eq!(loaded.functions.len(), 2);
        assert!(loaded.root.is_some());
    }
}
