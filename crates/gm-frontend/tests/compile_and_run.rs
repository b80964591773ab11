//! End-to-end: source text compiled by this crate, fixed up by `gm-format`,
//! and actually executed by `gm-vm`.

use gm_gc::{Collector, GcConfig};
use gm_io::Endian;
use gm_value::Variant;
use gm_vm::{CallFrame, JumpTable, OperatorRegistry, RunOutcome, Thread};

fn run(source: &str) -> RunOutcome {
    let lib = gm_frontend::compile(source, Endian::Little).expect("source compiles");
    let bytes = gm_format::encode(&lib, Endian::Little);
    let decoded = gm_format::decode(&bytes).unwrap();

    let mut gc = Collector::new(GcConfig::default());
    let loaded = gm_format::load(&decoded, &mut gc, 0).unwrap();
    let root = loaded.root.expect("program has a root function");

    let globals = gc.alloc_table();
    let operators = OperatorRegistry::new();
    let table = JumpTable::with_default_handlers();
    let mut thread = Thread::new(1, 4096, 65536);
    thread.push_frame(CallFrame { return_address: 0, base: 0, function: root, this_value: Variant::Null });

    gm_vm::run_thread(&mut gc, globals, &operators, &table, &mut thread, 10_000).unwrap()
}

#[test]
fn returns_the_sum_of_two_globals() {
    match run("global x = 3 + 4; return x;") {
        RunOutcome::Returned(Variant::Int(7)) => {}
        other => panic!("expected Int(7), got {other:?}"),
    }
}

#[test]
fn calls_a_declared_function_with_arguments() {
    match run("function add(a, b) { return a + b; } global result = add(3, 4); return result;") {
        RunOutcome::Returned(Variant::Int(7)) => {}
        other => panic!("expected Int(7), got {other:?}"),
    }
}

#[test]
fn while_loop_accumulates_a_local() {
    match run("function sum_to(n) { local total = 0; local i = 0; while (i < n) { total = total + i; i = i + 1; } return total; } return sum_to(5);") {
        RunOutcome::Returned(Variant::Int(10)) => {}
        other => panic!("expected Int(10), got {other:?}"),
    }
}

#[test]
fn if_else_selects_a_branch() {
    match run("function pick(flag) { if (flag) { return 1; } else { return 0; } } return pick(0);") {
        RunOutcome::Returned(Variant::Int(0)) => {}
        other => panic!("expected Int(0), got {other:?}"),
    }
}

#[test]
fn big_endian_round_trip_preserves_source_text() {
    let lib = gm_frontend::compile("function f(a, b) { return a + b; }", Endian::Big).unwrap();
    let bytes = gm_format::encode(&lib, Endian::Big);
    let decoded = gm_format::decode(&bytes).unwrap();
    assert_eq!(decoded.source_endian, Endian::Big);
    assert_eq!(decoded.source.as_deref(), Some("function f(a, b) { return a + b; }".as_bytes()));
}
