//! End-to-end: a breakpoint parks a thread mid-run, and a `mrun` command
//! resumes it to completion, exercising the scheduler/debug-hook seam.

use gm_debug::{Command, Session, SourceProvider};
use gm_gc::{Collector, GcConfig};
use gm_sched::Scheduler;
use gm_value::{LineEntry, ScriptFunction, Variant};
use gm_vm::{JumpTable, OpCode, OperatorRegistry};
use std::sync::{Arc, Mutex};

struct NoSources;
impl SourceProvider for NoSources {
    fn source(&self, _id: u32) -> Option<(&str, &str)> {
        None
    }
}

fn three_instruction_function(gc: &mut Collector) -> gm_value::Handle {
    // PUSH_NULL, PUSH_NULL, RETURN — two no-op lines before returning, so a
    // breakpoint on line 2 has somewhere to land before the function exits.
    let bytecode = vec![OpCode::PushNull as u8, OpCode::PushNull as u8, OpCode::Return as u8];
    gc.alloc_function_script(ScriptFunction {
        bytecode: Arc::from(bytecode),
        num_params: 0,
        num_locals: 0,
        max_stack: 4,
        source_id: 0,
        is_root: true,
        debug_name: None,
        lines: Arc::from(vec![LineEntry { address: 0, line: 1 }, LineEntry { address: 1, line: 2 }]),
        symbols: Arc::from(Vec::new()),
    })
}

#[test]
fn breakpoint_parks_the_thread_and_run_resumes_it() {
    let mut gc = Collector::new(GcConfig::default());
    let globals = gc.alloc_table();
    let operators = OperatorRegistry::new();
    let table = JumpTable::with_default_handlers();

    let func = three_instruction_function(&mut gc);
    let mut sched = Scheduler::new();
    let id = sched.spawn(&gc, func, Variant::Null, &[], 256, 4096).unwrap();

    let outgoing = Arc::new(Mutex::new(Vec::new()));
    let incoming: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let outgoing_for_send = outgoing.clone();
    let incoming_for_pump = incoming.clone();
    let mut session = Session::new(move || incoming_for_pump.lock().unwrap().pop(), move |bytes| outgoing_for_send.lock().unwrap().push(bytes));

    session.poll(&mut sched, &gc, &NoSources);
    incoming.lock().unwrap().push(gm_debug::encode_command(&gm_debug::Command::SetBreakpoint {
        rid: 1,
        source: 0,
        line: 2,
        thread: None,
        enabled: true,
    }));
    session.poll(&mut sched, &gc, &NoSources);

    let report = sched.step_with_hook(&mut gc, globals, &operators, &table, 0, gm_sched::UNLIMITED_BUDGET, Some(&mut session));
    assert_eq!(report.ran, 1);
    assert!(report.destroyed.is_empty(), "the thread should be parked at the breakpoint, not reaped");

    let broke = outgoing
        .lock()
        .unwrap()
        .iter()
        .any(|bytes| matches!(gm_debug::decode_reply(bytes), Ok(gm_debug::Reply::Broke { line: 2, .. })));
    assert!(broke, "expected a dbrk reply for line 2");

    // Clear the breakpoint before continuing, otherwise the parked
    // instruction would trip the same breakpoint again on resume.
    incoming.lock().unwrap().push(gm_debug::encode_command(&Command::SetBreakpoint {
        rid: 1,
        source: 0,
        line: 2,
        thread: None,
        enabled: false,
    }));
    session.poll(&mut sched, &gc, &NoSources);
    incoming.lock().unwrap().push(gm_debug::encode_command(&Command::Run));
    session.poll(&mut sched, &gc, &NoSources);

    let report = sched.step_with_hook(&mut gc, globals, &operators, &table, 0, gm_sched::UNLIMITED_BUDGET, Some(&mut session));
    assert_eq!(report.ran, 1);
    assert_eq!(report.destroyed, vec![(id, gm_sched::DestroyReason::Returned)]);
}
