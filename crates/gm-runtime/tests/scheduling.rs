//! End-to-end: scripts that call the default `sleep`/`block`/`signal`
//! bindings, driven entirely through `Machine::execute`.

use gm_runtime::{GmConfig, Machine};
use gm_sched::DestroyReason;

fn load_and_spawn(machine: &mut Machine, source: &str) -> gm_sched::ThreadId {
    let bytes = machine.compile_source(source).unwrap();
    let root = machine.load_lib(&bytes, None).unwrap();
    machine.spawn_root(root).unwrap()
}

#[test]
fn sleeping_thread_wakes_no_earlier_than_requested() {
    let mut machine = Machine::new(GmConfig::default());
    let tid = load_and_spawn(&mut machine, "sleep(10); return 1;");

    let report = machine.execute(0);
    assert_eq!(report.ran, 1);
    assert!(report.destroyed.is_empty());

    let report = machine.execute(5);
    assert!(report.destroyed.is_empty(), "must not wake before its wake time");

    let report = machine.execute(10);
    assert_eq!(report.destroyed, vec![(tid, DestroyReason::Returned)]);
}

#[test]
fn host_signal_wakes_a_blocked_thread() {
    let mut machine = Machine::new(GmConfig::default());
    let tid = load_and_spawn(&mut machine, "block(42); return 1;");

    machine.execute(0);
    let woken = machine.signal(42);
    assert_eq!(woken, vec![tid]);

    let report = machine.execute(1);
    assert_eq!(report.destroyed, vec![(tid, DestroyReason::Returned)]);
}

#[test]
fn script_level_signal_wakes_a_blocked_thread_on_the_next_step() {
    let mut machine = Machine::new(GmConfig::default());
    let waiter = load_and_spawn(&mut machine, "block(7); return 1;");
    machine.execute(0);

    let signaller = load_and_spawn(&mut machine, "signal(7); return 2;");
    let report = machine.execute(1);
    assert!(report.destroyed.iter().any(|(id, reason)| *id == signaller && *reason == DestroyReason::Returned));
    assert!(!report.destroyed.iter().any(|(id, _)| *id == waiter), "woken thread runs in the next step, not this one");

    let report = machine.execute(2);
    assert!(report.destroyed.iter().any(|(id, reason)| *id == waiter && *reason == DestroyReason::Returned));
}

#[test]
fn killing_a_sleeping_thread_reaps_it_without_running() {
    let mut machine = Machine::new(GmConfig::default());
    let tid = load_and_spawn(&mut machine, "sleep(1000); return 1;");
    machine.execute(0);

    machine.kill(tid);
    let report = machine.execute(2000);
    assert_eq!(report.destroyed, vec![(tid, DestroyReason::Killed)]);
}
