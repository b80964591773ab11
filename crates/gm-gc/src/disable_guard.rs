//! RAII guard for the library-load GC disable window.

use crate::collector::Collector;

/// Disables the collector for its lifetime, re-enabling on drop regardless of
/// which exit path (including an early return on error) leaves the guarded
/// scope. Loading a compiled library holds one of these so a partially
/// wired-up function object is never collected mid-fixup.
pub struct DisableGuard<'a> {
    collector: &'a mut Collector,
}

impl<'a> DisableGuard<'a> {
    pub fn new(collector: &'a mut Collector) -> Self {
        collector.disable();
        Self { collector }
    }

    pub fn collector_mut(&mut self) -> &mut Collector {
        self.collector
    }
}

impl Drop for DisableGuard<'_> {
    fn drop(&mut self) {
        self.collector.enable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;

    #[test]
    fn restores_enabled_state_on_drop() {
        let mut collector = Collector::new(GcConfig::default());
        assert!(!collector.is_disabled());
        {
            let mut guard = DisableGuard::new(&mut collector);
            assert!(guard.collector_mut().is_disabled());
        }
        assert!(!collector.is_disabled());
    }

    #[test]
    fn restores_on_early_return_via_question_mark() {
        fn load_fallible(collector: &mut Collector) -> Result<(), ()> {
            let _guard = DisableGuard::new(collector);
            Err(())
        }

        let mut collector = Collector::new(GcConfig::default());
        let _ = load_fallible(&mut collector);
        assert!(!collector.is_disabled());
    }
}
