//! Byte order selection for the library format.
//!
//! The compiled library format is read on whatever platform embeds the
//! runtime, which need not share the byte order of the machine that compiled
//! it; every multi-byte field is tagged with an explicit [`Endian`] rather
//! than assuming the host's order the way a fixed little-endian reader would.

/// Byte order used to encode or decode multi-byte integers and floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// The byte order of the machine gm-io is running on.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}
