//! Tunables threaded through [`crate::Machine::new`], collecting the
//! defaults scattered across the GC, scheduler and thread constructors into
//! one type.

use gm_gc::GcConfig;

/// Construction-time configuration for a [`crate::Machine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GmConfig {
    pub gc: GcConfig,
    /// A freshly spawned thread's initial value-stack allocation, in bytes.
    pub initial_thread_stack_bytes: usize,
    /// The value-stack byte cap a thread raises `StackOverflow` past.
    pub max_thread_stack_bytes: usize,
    /// Opcode budget handed to each running thread per [`crate::Machine::execute`] call.
    pub opcode_budget: usize,
    /// How many killed threads' backing stack/frame allocations are kept
    /// around for reuse by a later spawn.
    pub killed_thread_pool_size: usize,
}

impl Default for GmConfig {
    fn default() -> Self {
        Self {
            gc: GcConfig::default(),
            initial_thread_stack_bytes: 512,
            max_thread_stack_bytes: 128 * 1024,
            opcode_budget: gm_sched::UNLIMITED_BUDGET,
            killed_thread_pool_size: 16,
        }
    }
}
