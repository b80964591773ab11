//! The fixed-size file header and its magic-byte endian sniff.

use gm_io::Endian;

pub const MAGIC_LE: [u8; 4] = *b"gml0";
pub const MAGIC_BE: [u8; 4] = *b"0lmg";

pub const FLAG_DEBUG_INFO_PRESENT: u32 = 1 << 0;
pub const FUNC_FLAG_ROOT: u32 = 1 << 0;

/// `magic(4) flags(4) offset_strings(4) offset_source(4) offset_functions(4)`.
pub const HEADER_LEN: usize = 20;

/// Looks at the first 4 bytes without interpreting any other field, since
/// they decide the byte order every other field is read in.
pub fn detect_endian(bytes: &[u8]) -> Option<Endian> {
    let magic: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    if magic == MAGIC_LE {
        Some(Endian::Little)
    } else if magic == MAGIC_BE {
        Some(Endian::Big)
    } else {
        None
    }
}

pub fn magic_for(endian: Endian) -> [u8; 4] {
    match endian {
        Endian::Little => MAGIC_LE,
        Endian::Big => MAGIC_BE,
    }
}
