//! Slab and chain allocators backing the GameMonkey object heap.
//!
//! Two allocation strategies, each grounded on a distinct allocator from the
//! original runtime: [`ChainArena`] is a bump-pointer chunk chain for
//! transient scratch memory, while [`FixedSet`] buckets small fixed-size
//! requests into reusable slabs. Neither type touches garbage collection
//! directly; `gm-gc` builds its object heap on top of [`FixedSet`].

mod chain;
mod error;
mod fixed_set;

pub use chain::ChainArena;
pub use error::{AllocError, AllocResult};
pub use fixed_set::{FixedHandle, FixedSet, BUCKET_SIZES};
