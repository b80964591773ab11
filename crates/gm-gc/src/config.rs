//! Tunables for the collector's budgeting and safety passes.

/// Configuration for a [`crate::Collector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcConfig {
    /// Byte threshold that forces a full synchronous collection before an
    /// allocation returns.
    pub initial_hard_limit: usize,
    /// After each completed cycle, `soft_limit := allocated * auto_mem_multiply`
    /// and `hard_limit := soft_limit * 10 / 9`.
    pub auto_mem_multiply: f32,
    /// Re-traces persistent objects once more before sweep, catching
    /// persistent-to-persistent cycles the write barrier alone could miss.
    /// Off by default, matching the source's default.
    pub three_pass_gc: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_hard_limit: 128 * 1024,
            auto_mem_multiply: 2.5,
            three_pass_gc: false,
        }
    }
}

impl GcConfig {
    pub fn initial_soft_limit(&self) -> usize {
        self.initial_hard_limit * 9 / 10
    }
}
