//! Breakpoints, keyed by the runtime (source, line) pair they guard.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub rid: u32,
    pub source: u32,
    pub line: u32,
    /// `None` matches any thread; `Some(id)` scopes the breakpoint to one.
    pub thread: Option<u32>,
    pub enabled: bool,
}

/// Live breakpoints, keyed by the client-assigned request id so a later
/// `msbp` with the same `rid` updates or clears it.
#[derive(Debug, Default)]
pub struct BreakpointTable {
    by_rid: HashMap<u32, Breakpoint>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or clears, when `bp.enabled` is false) the breakpoint at
    /// `bp.rid`.
    pub fn set(&mut self, bp: Breakpoint) {
        if bp.enabled {
            self.by_rid.insert(bp.rid, bp);
        } else {
            self.by_rid.remove(&bp.rid);
        }
    }

    /// True if any enabled breakpoint matches `(source, line)` and is either
    /// unscoped or scoped to `thread_id`.
    pub fn matches(&self, source: u32, line: u32, thread_id: u32) -> bool {
        self.by_rid
            .values()
            .any(|bp| bp.enabled && bp.source == source && bp.line == line && bp.thread.map_or(true, |t| t == thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bp(rid: u32, source: u32, line: u32, thread: Option<u32>, enabled: bool) -> Breakpoint {
        Breakpoint { rid, source, line, thread, enabled }
    }

    #[test]
    fn unscoped_breakpoint_matches_any_thread() {
        let mut t = BreakpointTable::new();
        t.set(bp(1, 0, 10, None, true));
        assert!(t.matches(0, 10, 5));
        assert!(t.matches(0, 10, 6));
        assert!(!t.matches(0, 11, 5));
    }

    #[test]
    fn scoped_breakpoint_matches_only_its_thread() {
        let mut t = BreakpointTable::new();
        t.set(bp(1, 0, 10, Some(5), true));
        assert!(t.matches(0, 10, 5));
        assert!(!t.matches(0, 10, 6));
    }

    #[test]
    fn setting_disabled_clears_an_existing_breakpoint() {
        let mut t = BreakpointTable::new();
        t.set(bp(1, 0, 10, None, true));
        t.set(bp(1, 0, 10, None, false));
        assert!(!t.matches(0, 10, 5));
    }
}
