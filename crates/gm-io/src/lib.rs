//! Endian-aware binary I/O for the compiled library format.
//!
//! Unlike a reader fixed to one byte order, [`Reader`] and [`Writer`] each
//! carry an [`Endian`] chosen at construction time, so a library compiled on
//! one target can be read correctly on another.

mod endian;
mod error;
mod reader;
mod writer;

pub use endian::Endian;
pub use error::{IoError, IoResult};
pub use reader::Reader;
pub use writer::Writer;
