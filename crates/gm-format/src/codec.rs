//! Encoding and decoding the `gml0` container to and from bytes.

use crate::error::{FormatError, FormatResult};
use crate::header::{self, FLAG_DEBUG_INFO_PRESENT, FUNC_FLAG_ROOT, HEADER_LEN};
use crate::library::{CompiledFunction, CompiledLibrary, FunctionDebugInfo};
use gm_io::{Endian, Reader, Writer};

const FUNC_TAG: [u8; 4] = *b"func";

pub fn encode(lib: &CompiledLibrary, endian: Endian) -> Vec<u8> {
    let debug = lib.has_debug_info();

    let mut strings_section = Writer::new(endian);
    strings_section.write_u32(lib.strings.len() as u32);
    strings_section.write_bytes(&lib.strings);
    let strings_section = strings_section.into_bytes();

    let source_section = if debug {
        let mut w = Writer::new(endian);
        let source = lib.source.as_deref().unwrap_or(&[]);
        w.write_u32(source.len() as u32);
        w.write_u32(0); // reserved
        w.write_bytes(source);
        Some(w.into_bytes())
    } else {
        None
    };

    let mut functions_section = Writer::new(endian);
    functions_section.write_u32(lib.functions.len() as u32);
    for f in &lib.functions {
        functions_section.write_bytes(&FUNC_TAG);
        functions_section.write_u32(f.id);
        functions_section.write_u32(if f.is_root { FUNC_FLAG_ROOT } else { 0 });
        functions_section.write_u32(f.num_params);
        functions_section.write_u32(f.num_locals);
        functions_section.write_u32(f.max_stack);
        functions_section.write_u32(f.bytecode.len() as u32);
        functions_section.write_bytes(&f.bytecode);
        if debug {
            let d = f.debug.clone().unwrap_or_default();
            functions_section.write_u32(d.debug_name_str_off);
            functions_section.write_u32(d.lines.len() as u32);
            for (addr, line) in &d.lines {
                functions_section.write_u32(*addr);
                functions_section.write_u32(*line);
            }
            for off in &d.sym_str_offs {
                functions_section.write_u32(*off);
            }
        }
    }
    let functions_section = functions_section.into_bytes();

    let offset_strings = HEADER_LEN as u32;
    let offset_source = source_section.as_ref().map(|_| offset_strings + strings_section.len() as u32).unwrap_or(0);
    let offset_functions = offset_strings
        + strings_section.len() as u32
        + source_section.as_ref().map(|s| s.len() as u32).unwrap_or(0);

    let mut header = Writer::with_capacity(HEADER_LEN, endian);
    header.write_bytes(&header::magic_for(endian));
    header.write_u32(if debug { FLAG_DEBUG_INFO_PRESENT } else { 0 });
    header.write_u32(offset_strings);
    header.write_u32(offset_source);
    header.write_u32(offset_functions);

    let mut out = header.into_bytes();
    out.extend_from_slice(&strings_section);
    if let Some(source_section) = &source_section {
        out.extend_from_slice(source_section);
    }
    out.extend_from_slice(&functions_section);
    out
}

pub fn decode(bytes: &[u8]) -> FormatResult<CompiledLibrary> {
    let endian = header::detect_endian(bytes).ok_or_else(|| {
        let mut magic = [0u8; 4];
        let len = bytes.len().min(4);
        magic[..len].copy_from_slice(&bytes[..len]);
        FormatError::BadMagic(magic)
    })?;

    let mut r = Reader::new(bytes.to_vec(), endian);
    r.skip(4)?; // magic, already sniffed
    let flags = r.read_u32()?;
    let debug = flags & FLAG_DEBUG_INFO_PRESENT != 0;
    let offset_strings = r.read_u32()? as usize;
    let offset_source = r.read_u32()? as usize;
    let offset_functions = r.read_u32()? as usize;

    r.seek(offset_strings)?;
    let strings_len = r.read_u32()? as usize;
    let strings = r.read_bytes(strings_len)?;

    let source = if debug {
        r.seek(offset_source)?;
        let len = r.read_u32()? as usize;
        r.read_u32()?; // reserved
        Some(r.read_bytes(len)?)
    } else {
        None
    };

    r.seek(offset_functions)?;
    let count = r.read_u32()? as usize;
    let mut functions = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = r.read_bytes(4)?;
        if tag.as_slice() != FUNC_TAG {
            return Err(FormatError::Malformed(format!("expected 'func' tag, found {tag:?}")));
        }
        let id = r.read_u32()?;
        let flags = r.read_u32()?;
        let num_params = r.read_u32()?;
        let num_locals = r.read_u32()?;
        let max_stack = r.read_u32()?;
        let bytecode_len = r.read_u32()? as usize;
        let bytecode = r.read_bytes(bytecode_len)?;

        let debug_info = if debug {
            let debug_name_str_off = r.read_u32()?;
            let line_count = r.read_u32()? as usize;
            let mut lines = Vec::with_capacity(line_count);
            for _ in 0..line_count {
                let addr = r.read_u32()?;
                let line = r.read_u32()?;
                lines.push((addr, line));
            }
            let sym_count = (num_params + num_locals) as usize;
            let mut sym_str_offs = Vec::with_capacity(sym_count);
            for _ in 0..sym_count {
                sym_str_offs.push(r.read_u32()?);
            }
            Some(FunctionDebugInfo { debug_name_str_off, lines, sym_str_offs })
        } else {
            None
        };

        functions.push(CompiledFunction {
            id,
            is_root: flags & FUNC_FLAG_ROOT != 0,
            num_params,
            num_locals,
            max_stack,
            bytecode,
            debug: debug_info,
        });
    }

    Ok(CompiledLibrary { strings, source, functions, source_endian: endian })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompiledLibrary {
        CompiledLibrary {
            strings: b"main\0x\0".to_vec(),
            source: None,
            functions: vec![CompiledFunction {
                id: 0,
                is_root: true,
                num_params: 0,
                num_locals: 1,
                max_stack: 4,
                bytecode: vec![4, 17], // PUSH_NULL, RETURN
                debug: None,
            }],
            source_endian: Endian::Little,
        }
    }

    #[test]
    fn round_trips_without_debug_info() {
        let lib = sample();
        let bytes = encode(&lib, Endian::Little);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, lib);
    }

    #[test]
    fn round_trips_big_endian() {
        let mut lib = sample();
        lib.source_endian = Endian::Big;
        let bytes = encode(&lib, Endian::Big);
        assert_eq!(&bytes[..4], &header::MAGIC_BE);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, lib);
    }

    #[test]
    fn round_trips_with_debug_info() {
        let mut lib = sample();
        lib.source = Some(b"function main() { return null; }".to_vec());
        lib.functions[0].debug = Some(FunctionDebugInfo {
            debug_name_str_off: 0,
            lines: vec![(0, 1), (1, 1)],
            sym_str_offs: vec![5],
        });
        let bytes = encode(&lib, Endian::Little);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, lib);
    }

    #[test]
    fn rejects_unknown_magic() {
        let bytes = vec![b'x', b'x', b'x', b'x', 0, 0, 0, 0];
        assert!(matches!(decode(&bytes), Err(FormatError::BadMagic(_))));
    }
}
