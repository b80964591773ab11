//! The small default native-binding set every fresh [`crate::Machine`]
//! registers: `sleep`, `block` and `signal`, enough to drive the
//! cooperative-scheduler scenarios without pulling in a full standard
//! library (deliberately out of scope, per the purpose-and-scope notes).

use gm_value::{NativeFn, NativeOutcome, Variant, YieldReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

fn arg_as_u64(args: &[Variant], index: usize) -> u64 {
    match args.get(index) {
        Some(Variant::Int(v)) => (*v).max(0) as u64,
        Some(Variant::Float(v)) => v.max(0.0) as u64,
        _ => 0,
    }
}

fn arg_as_u32(args: &[Variant], index: usize) -> u32 {
    match args.get(index) {
        Some(Variant::Int(v)) => *v as u32,
        Some(Variant::Float(v)) => *v as u32,
        _ => 0,
    }
}

/// `sleep(ms)` — yields the calling thread until at least `ms` milliseconds
/// of the embedder-supplied clock have elapsed.
pub fn sleep_fn(now: Arc<AtomicU64>) -> NativeFn {
    Arc::new(move |args: &[Variant]| {
        let wake_time_ms = now.load(Ordering::Relaxed) + arg_as_u64(args, 0);
        NativeOutcome::Yield(YieldReason::Sleep { wake_time_ms })
    })
}

/// `block(signal)` — yields the calling thread until a `signal(signal)` call
/// wakes it.
pub fn block_fn() -> NativeFn {
    Arc::new(|args: &[Variant]| NativeOutcome::Yield(YieldReason::Block { signal: arg_as_u32(args, 0) }))
}

/// `signal(key)` — queues a wake for every thread blocked on `key`. A native
/// call has no direct handle to the scheduler it's suspending within, so the
/// actual `Scheduler::signal` happens at the end of the embedder's next
/// `Machine::execute`, which drains this queue.
pub fn signal_fn(pending: Arc<Mutex<Vec<u32>>>) -> NativeFn {
    Arc::new(move |args: &[Variant]| {
        pending.lock().expect("pending signal queue poisoned").push(arg_as_u32(args, 0));
        NativeOutcome::Return(Variant::Null)
    })
}
