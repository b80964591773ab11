//! A single call frame on a thread's frame stack.

use gm_value::{Handle, Variant};

/// Bookkeeping for one active call. The previous frame is simply the one
/// below this in the thread's `Vec<CallFrame>` — no separate prev-link is
/// needed since frames are only ever pushed/popped from the top.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    /// Address to resume at in the caller's bytecode after `RETURN`.
    pub return_address: u32,
    /// Index into the thread's value stack where this frame's locals begin.
    pub base: usize,
    /// The script function this frame is executing.
    pub function: Handle,
    /// The bound `this` value for the call.
    pub this_value: Variant,
}
