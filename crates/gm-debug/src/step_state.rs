//! Per-thread stepping scratch, kept in a side table keyed by thread id
//! rather than on `gm_vm::Thread` itself.

use std::collections::HashMap;

/// Stepping intent and break status for one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepState {
    pub step_into: bool,
    pub step_over: bool,
    pub step_out: bool,
    pub at_break: bool,
    /// Frame depth recorded when the step command was issued.
    pub base_depth: usize,
    /// Set by a call/return hook that wants the *next* `should_break` check
    /// to break unconditionally (e.g. STEP_INTO landing on the callee's
    /// first instruction).
    pub pending_break: bool,
}

impl StepState {
    fn clear_step_flags(&mut self) {
        self.step_into = false;
        self.step_over = false;
        self.step_out = false;
        self.pending_break = false;
    }
}

/// The side table: one [`StepState`] per thread id, created lazily.
#[derive(Debug, Default)]
pub struct StepTable {
    threads: HashMap<u32, StepState>,
}

impl StepTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: u32) -> StepState {
        self.threads.get(&thread_id).copied().unwrap_or_default()
    }

    pub fn entry(&mut self, thread_id: u32) -> &mut StepState {
        self.threads.entry(thread_id).or_default()
    }

    pub fn remove(&mut self, thread_id: u32) {
        self.threads.remove(&thread_id);
    }

    /// Arms STEP_INTO from `depth` and clears any break.
    pub fn step_into(&mut self, thread_id: u32, depth: usize) {
        let s = self.entry(thread_id);
        s.clear_step_flags();
        s.step_into = true;
        s.base_depth = depth;
        s.at_break = false;
    }

    pub fn step_over(&mut self, thread_id: u32, depth: usize) {
        let s = self.entry(thread_id);
        s.clear_step_flags();
        s.step_over = true;
        s.base_depth = depth;
        s.at_break = false;
    }

    pub fn step_out(&mut self, thread_id: u32, depth: usize) {
        let s = self.entry(thread_id);
        s.clear_step_flags();
        s.step_out = true;
        s.base_depth = depth;
        s.at_break = false;
    }

    /// Clears stepping intent and break status, letting the thread run
    /// freely until the next breakpoint.
    pub fn resume(&mut self, thread_id: u32) {
        let s = self.entry(thread_id);
        s.clear_step_flags();
        s.at_break = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_threads_default_to_no_stepping_intent() {
        let table = StepTable::new();
        assert_eq!(table.get(7), StepState::default());
    }

    #[test]
    fn step_into_clears_other_flags() {
        let mut table = StepTable::new();
        table.step_over(1, 3);
        table.step_into(1, 2);
        let s = table.get(1);
        assert!(s.step_into);
        assert!(!s.step_over);
        assert_eq!(s.base_depth, 2);
    }
}
