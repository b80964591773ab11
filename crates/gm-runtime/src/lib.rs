//! The embedding facade: a [`Machine`] that wires the object heap, garbage
//! collector, operator registry, cooperative scheduler and compiled-library
//! loader together behind the surface an embedder actually calls —
//! `compile_source`/`load_lib`, value push/pop, the [`CallBuilder`] call
//! helper, and a single `execute(now_ms)` step.

mod call_builder;
mod config;
mod error;
mod library;
mod machine;

pub use call_builder::CallBuilder;
pub use config::GmConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use machine::{Machine, UserTypeCallbacks};

#[cfg(test)]
mod tests {
    use super::*;
    use gm_sched::UNLIMITED_BUDGET;

    fn run_to_completion(machine: &mut Machine, mut now_ms: u64) -> gm_sched::StepReport {
        loop {
            let report = machine.execute(now_ms);
            if !report.destroyed.is_empty() || report.was_idle() {
                return report;
            }
            now_ms += 1;
        }
    }

    #[test]
    fn compiles_and_runs_a_source_program_end_to_end() {
        let mut machine = Machine::new(GmConfig::default());
        let bytes = machine.compile_source("global x = 2 + 3; return x;").unwrap();
        let root = machine.load_lib(&bytes, Some("inline")).unwrap();

        let tid = machine.begin_global("__no_such_entry__").end();
        assert!(tid.is_err());

        let tid = machine.spawn_root(root).expect("spawning the loaded root function succeeds");
        let report = run_to_completion(&mut machine, 0);
        assert_eq!(report.destroyed[0].0, tid);
    }

    #[test]
    fn begin_global_calls_a_loaded_function() {
        let mut machine = Machine::new(GmConfig::default());
        let bytes = machine
            .compile_source("function add(a, b) { return a + b; } global unused = add(0, 0);")
            .unwrap();
        machine.load_lib(&bytes, None).unwrap();

        let tid = machine.begin_global("add").add_param_int(3).add_param_int(4).end().unwrap();
        let report = run_to_completion(&mut machine, 0);
        assert_eq!(report.destroyed[0], (tid, gm_sched::DestroyReason::Returned));
    }

    #[test]
    fn get_source_returns_embedded_text_after_load() {
        let mut machine = Machine::new(GmConfig::default());
        let bytes = machine.compile_source("return null;").unwrap();
        machine.load_lib(&bytes, Some("script.gm")).unwrap();
        let (name, text) = machine.get_source(0).unwrap();
        assert_eq!(name, "script.gm");
        assert_eq!(text, "return null;");
    }

    #[test]
    fn log_stays_empty_until_a_thread_raises() {
        let machine = Machine::new(GmConfig::default());
        assert_eq!(machine.get_log().count(), 0);
    }

    #[test]
    fn default_config_runs_threads_until_they_yield() {
        assert_eq!(GmConfig::default().opcode_budget, UNLIMITED_BUDGET);
    }
}
