//! The `gml0` compiled library container: encode/decode to bytes, and the
//! load-time fixup that turns a decoded library's string offsets and
//! function ids into live heap handles.

mod codec;
mod error;
mod fixup;
mod header;
mod library;

pub use codec::{decode, encode};
pub use error::{FormatError, FormatResult};
pub use fixup::{load, LoadedLibrary};
pub use header::{FLAG_DEBUG_INFO_PRESENT, FUNC_FLAG_ROOT, HEADER_LEN};
pub use library::{CompiledFunction, CompiledLibrary, FunctionDebugInfo};
