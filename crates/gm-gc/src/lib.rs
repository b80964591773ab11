//! The tri-colour incremental mark-sweep collector and the object heap it
//! owns.
//!
//! [`Collector`] wraps a [`gm_value::Heap`], adding the colour lists, write
//! barrier, byte budgeting and root set that turn a bare heap into a garbage
//! collector. Everything that allocates a heap object goes through the
//! collector, never the heap directly, so every allocation is charged and
//! coloured consistently.

mod collector;
mod config;
mod disable_guard;

pub use collector::{Collector, UserTracer};
pub use config::GcConfig;
pub use disable_guard::DisableGuard;
