//! Error types for the `gm-alloc` crate.

use thiserror::Error;

/// Errors raised by the slab and chain allocators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// A fixed-size slab was asked to hand back an element size it does not own.
    #[error("free of size {size} does not belong to any bucket in this fixed set")]
    UnknownBucket { size: usize },

    /// A chain allocator was asked for more elements than fit in one chunk.
    #[error("chunk size {chunk_size} is too small to allocate {requested} elements at once")]
    ChunkTooSmall { requested: usize, chunk_size: usize },

    /// The underlying system allocator failed.
    #[error("allocation of {size} bytes for {purpose} failed")]
    OutOfMemory { size: usize, purpose: String },
}

/// Result type for allocator operations.
pub type AllocResult<T> = std::result::Result<T, AllocError>;

impl AllocError {
    pub fn out_of_memory<S: Into<String>>(size: usize, purpose: S) -> Self {
        Self::OutOfMemory {
            size,
            purpose: purpose.into(),
        }
    }
}
