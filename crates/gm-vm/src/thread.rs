//! A cooperatively-scheduled fiber and its execution state.

use crate::error::{VmError, VmResult};
use crate::frame::CallFrame;
use gm_value::Variant;

/// A thread's run state. The scheduler (`gm-sched`) moves threads between
/// its queues based on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Running,
    Sleeping,
    Blocked,
    Exception,
    Killed,
}

/// One cooperatively-scheduled fiber of execution.
///
/// Stepping/breakpoint state used by the debug protocol does *not* live
/// here: it's kept in a side table keyed by thread id (see `gm-debug`'s
/// `StepState`) so a thread can be inspected or rewound without this crate
/// knowing anything about the debug wire protocol.
pub struct Thread {
    pub id: u32,
    stack: Vec<Variant>,
    max_len: usize,
    pub frames: Vec<CallFrame>,
    pub state: ThreadState,
    pub ip: u32,
    pub wake_time_ms: u64,
    pub blocked_signal: Option<u32>,
}

const VARIANT_SIZE: usize = std::mem::size_of::<Variant>();

impl Thread {
    pub fn new(id: u32, initial_stack_bytes: usize, max_stack_bytes: usize) -> Self {
        let initial_len = (initial_stack_bytes / VARIANT_SIZE).max(1);
        Self {
            id,
            stack: Vec::with_capacity(initial_len),
            max_len: max_stack_bytes / VARIANT_SIZE,
            frames: Vec::new(),
            state: ThreadState::Running,
            ip: 0,
            wake_time_ms: 0,
            blocked_signal: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, value: Variant) -> VmResult<()> {
        if self.stack.len() >= self.max_len {
            return Err(VmError::StackOverflow { cap: self.max_len * VARIANT_SIZE });
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<Variant> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn peek(&self) -> VmResult<Variant> {
        self.stack.last().copied().ok_or(VmError::StackUnderflow)
    }

    pub fn get(&self, index: usize) -> VmResult<Variant> {
        self.stack.get(index).copied().ok_or(VmError::StackUnderflow)
    }

    pub fn set(&mut self, index: usize, value: Variant) -> VmResult<()> {
        *self.stack.get_mut(index).ok_or(VmError::StackUnderflow)? = value;
        Ok(())
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn truncate(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    pub fn current_frame(&self) -> VmResult<&CallFrame> {
        self.frames.last().ok_or(VmError::FrameUnderflow)
    }

    pub fn push_frame(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> VmResult<CallFrame> {
        self.frames.pop().ok_or(VmError::FrameUnderflow)
    }

    /// Re-initialises a dead thread for reuse, keeping the stack's and frame
    /// vector's already-grown capacity so a pooled slot doesn't reallocate.
    pub fn reset(&mut self, id: u32) {
        self.id = id;
        self.stack.clear();
        self.frames.clear();
        self.state = ThreadState::Running;
        self.ip = 0;
        self.wake_time_ms = 0;
        self.blocked_signal = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_respects_the_byte_cap() {
        let mut t = Thread::new(1, VARIANT_SIZE, VARIANT_SIZE * 2);
        t.push(Variant::Int(1)).unwrap();
        t.push(Variant::Int(2)).unwrap();
        assert!(t.push(Variant::Int(3)).is_err());
    }

    #[test]
    fn pop_on_empty_stack_underflows() {
        let mut t = Thread::new(1, 512, 1024);
        assert!(matches!(t.pop(), Err(VmError::StackUnderflow)));
    }
}
