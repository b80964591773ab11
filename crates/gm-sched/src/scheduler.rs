//! The cooperative scheduler: running/sleeping/blocked queues driving
//! [`gm_vm::run_thread`] one opcode-budgeted slice at a time.

use crate::error::{SchedError, SchedResult};
use crate::sleep_entry::SleepEntry;
use gm_gc::Collector;
use gm_value::{FunctionObject, Handle, Object, Variant, YieldReason};
use gm_vm::{JumpTable, OperatorRegistry, RunOutcome, Thread, ThreadState};
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

pub type ThreadId = u32;
pub type Signal = u32;

/// Cap on how many killed threads' backing allocations ([`Thread`]'s stack
/// and frame vectors) are kept around for reuse by a later `spawn`.
const DEAD_POOL_CAP: usize = 16;

/// Default per-step opcode budget: run a thread until it yields rather than
/// capping by instruction count.
pub const UNLIMITED_BUDGET: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    Returned,
    Exception,
    Killed,
}

/// Fired once per destroyed thread at the end of the `step` that reaped it.
pub type DestroyHook = Arc<dyn Fn(ThreadId, DestroyReason) + Send + Sync>;

#[derive(Debug, Default)]
pub struct StepReport {
    /// Number of threads actually executed this step (threads that were
    /// merely woken or signalled don't count until they run).
    pub ran: usize,
    pub destroyed: Vec<(ThreadId, DestroyReason)>,
}

impl StepReport {
    /// True when nothing ran and nothing was reaped — the condition under
    /// which the embedder may want to spend the tick on a GC slice instead.
    pub fn was_idle(&self) -> bool {
        self.ran == 0 && self.destroyed.is_empty()
    }
}

pub struct Scheduler {
    threads: HashMap<ThreadId, Thread>,
    running: VecDeque<ThreadId>,
    sleeping: BinaryHeap<SleepEntry>,
    blocked: HashMap<Signal, VecDeque<ThreadId>>,
    dead_pool: Vec<Thread>,
    dead_pool_cap: usize,
    next_id: ThreadId,
    on_destroy: Option<DestroyHook>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_dead_pool_cap(DEAD_POOL_CAP)
    }

    /// Like [`new`](Self::new), but with a caller-chosen cap on how many
    /// killed threads' backing allocations are pooled for reuse.
    pub fn with_dead_pool_cap(dead_pool_cap: usize) -> Self {
        Self {
            threads: HashMap::new(),
            running: VecDeque::new(),
            sleeping: BinaryHeap::new(),
            blocked: HashMap::new(),
            dead_pool: Vec::new(),
            dead_pool_cap,
            next_id: 1,
            on_destroy: None,
        }
    }

    pub fn set_destroy_hook(&mut self, hook: DestroyHook) {
        self.on_destroy = Some(hook);
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(&id)
    }

    /// Every live thread, regardless of which queue (or none) it's
    /// currently sitting in. Used by the debug session to answer `mgti`.
    pub fn threads(&self) -> impl Iterator<Item = (ThreadId, &Thread)> {
        self.threads.iter().map(|(&id, t)| (id, t))
    }

    /// Puts a thread back on the running queue, e.g. one the debug hook
    /// parked with [`RunOutcome::Broke`](gm_vm::RunOutcome::Broke) or one
    /// the debug session is resuming from a step command. A no-op if the
    /// thread id is unknown (already reaped).
    pub fn resume(&mut self, id: ThreadId) {
        if self.threads.contains_key(&id) {
            self.running.push_back(id);
        }
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn sleeping_count(&self) -> usize {
        self.sleeping.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.values().map(VecDeque::len).sum()
    }

    /// Creates a new thread at the entry of a root script function, pads or
    /// drops `args` to the function's parameter count, and places it on the
    /// running queue. Reuses a pooled dead thread's allocations when one is
    /// available.
    pub fn spawn(
        &mut self,
        gc: &Collector,
        function: Handle,
        this_value: Variant,
        args: &[Variant],
        initial_stack_bytes: usize,
        max_stack_bytes: usize,
    ) -> SchedResult<ThreadId> {
        let (num_params, num_locals) = match gc.heap().get(function) {
            Some(Object::Function(FunctionObject::Script(f))) => (f.num_params, f.num_locals),
            _ => return Err(SchedError::NotAScriptFunction),
        };

        let id = self.next_id;
        self.next_id += 1;

        let mut thread = match self.dead_pool.pop() {
            Some(mut t) => {
                t.reset(id);
                t
            }
            None => Thread::new(id, initial_stack_bytes, max_stack_bytes),
        };

        for i in 0..num_params as usize {
            thread.push(args.get(i).copied().unwrap_or(Variant::Null))?;
        }
        for _ in num_params as usize..num_locals as usize {
            thread.push(Variant::Null)?;
        }
        thread.push_frame(gm_vm::CallFrame {
            return_address: 0,
            base: 0,
            function,
            this_value,
        });

        self.threads.insert(id, thread);
        self.running.push_back(id);
        Ok(id)
    }

    /// Marks a thread killed; it's torn down the next time it's popped off
    /// whatever queue it's sitting in, dropped out of that queue first.
    pub fn kill(&mut self, id: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.state = ThreadState::Killed;
        }
    }

    /// Wakes every thread blocked on `signal`, in block order, moving them
    /// to the running queue. Returns the ids that actually woke (killed
    /// threads found in the queue are reaped instead and excluded).
    pub fn signal(&mut self, signal: Signal) -> Vec<ThreadId> {
        let mut woken = Vec::new();
        if let Some(queue) = self.blocked.remove(&signal) {
            for id in queue {
                match self.threads.get(&id).map(|t| t.state) {
                    Some(ThreadState::Killed) => {
                        self.reap(id, DestroyReason::Killed);
                    }
                    Some(_) => {
                        self.running.push_back(id);
                        woken.push(id);
                    }
                    None => {}
                }
            }
        }
        woken
    }

    /// Runs one scheduler tick: wakes due sleepers, executes every thread
    /// currently in the running queue for up to `opcode_budget` instructions,
    /// and reaps anything that finished, excepted, or was killed.
    pub fn step(
        &mut self,
        gc: &mut Collector,
        globals: Handle,
        operators: &OperatorRegistry,
        table: &JumpTable,
        now_ms: u64,
        opcode_budget: usize,
    ) -> StepReport {
        self.step_with_hook(gc, globals, operators, table, now_ms, opcode_budget, None)
    }

    /// Like [`step`](Self::step), but consults a debug hook on every
    /// instruction so a broken-at thread stays parked instead of running.
    #[allow(clippy::too_many_arguments)]
    pub fn step_with_hook(
        &mut self,
        gc: &mut Collector,
        globals: Handle,
        operators: &OperatorRegistry,
        table: &JumpTable,
        now_ms: u64,
        opcode_budget: usize,
        mut hook: Option<&mut dyn gm_vm::DebugHook>,
    ) -> StepReport {
        let mut report = StepReport::default();

        while let Some(top) = self.sleeping.peek() {
            if top.wake_time_ms > now_ms {
                break;
            }
            let entry = self.sleeping.pop().expect("just peeked");
            match self.threads.get(&entry.id).map(|t| t.state) {
                Some(ThreadState::Killed) => report.destroyed.push(self.reap(entry.id, DestroyReason::Killed)),
                Some(_) => self.running.push_back(entry.id),
                None => {}
            }
        }

        let batch = self.running.len();
        for _ in 0..batch {
            let id = match self.running.pop_front() {
                Some(id) => id,
                None => break,
            };
            let thread = match self.threads.get_mut(&id) {
                Some(t) => t,
                None => continue,
            };
            if thread.state == ThreadState::Killed {
                report.destroyed.push(self.reap(id, DestroyReason::Killed));
                continue;
            }

            report.ran += 1;
            let hook = hook.as_deref_mut();
            match gm_vm::run_thread_with_hook(gc, globals, operators, table, thread, opcode_budget, hook) {
                Ok(RunOutcome::BudgetExhausted) => self.running.push_back(id),
                Ok(RunOutcome::Broke) => {
                    // Parked: the debug session observes `at_break` and
                    // leaves it out of the run list until a step/run command.
                }
                Ok(RunOutcome::Yielded(reason)) => match reason {
                    YieldReason::Sleep { wake_time_ms } => {
                        self.sleeping.push(SleepEntry { wake_time_ms, id });
                    }
                    YieldReason::Block { signal } => {
                        self.blocked.entry(signal).or_default().push_back(id);
                    }
                },
                Ok(RunOutcome::Returned(_)) => {
                    report.destroyed.push(self.reap(id, DestroyReason::Returned));
                }
                Err(err) => {
                    log::error!("thread {id} raised an exception: {err}");
                    if let Some(t) = self.threads.get_mut(&id) {
                        t.state = ThreadState::Exception;
                    }
                    report.destroyed.push(self.reap(id, DestroyReason::Exception));
                }
            }
        }

        report
    }

    fn reap(&mut self, id: ThreadId, reason: DestroyReason) -> (ThreadId, DestroyReason) {
        if let Some(thread) = self.threads.remove(&id) {
            if self.dead_pool.len() < self.dead_pool_cap {
                self.dead_pool.push(thread);
            }
        }
        if let Some(hook) = &self.on_destroy {
            hook(id, reason);
        }
        (id, reason)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_gc::GcConfig;
    use gm_value::ScriptFunction;
    use std::sync::Arc as StdArc;

    fn make_script(gc: &mut Collector, bytecode: Vec<u8>, num_params: u32, num_locals: u32) -> Handle {
        gc.alloc_function_script(ScriptFunction {
            bytecode: StdArc::from(bytecode),
            num_params,
            num_locals,
            max_stack: 8,
            source_id: 0,
            is_root: true,
            debug_name: None,
            lines: StdArc::from(Vec::new()),
            symbols: StdArc::from(Vec::new()),
        })
    }

    fn halt_bytecode() -> Vec<u8> {
        // PUSH_NULL (op 4, no operand) then RETURN (op 17, no operand).
        vec![4, 17]
    }

    #[test]
    fn spawn_places_a_thread_on_the_running_queue() {
        let mut gc = Collector::new(GcConfig::default());
        let globals = gc.alloc_table();
        let func = make_script(&mut gc, halt_bytecode(), 0, 0);
        let mut sched = Scheduler::new();
        let id = sched.spawn(&gc, func, Variant::Null, &[], 256, 4096).unwrap();
        assert_eq!(sched.running_count(), 1);
        assert!(sched.thread(id).is_some());
    }

    #[test]
    fn step_runs_a_thread_to_completion_and_reaps_it() {
        let mut gc = Collector::new(GcConfig::default());
        let globals = gc.alloc_table();
        let func = make_script(&mut gc, halt_bytecode(), 0, 0);
        let mut sched = Scheduler::new();
        sched.spawn(&gc, func, Variant::Null, &[], 256, 4096).unwrap();

        let table = JumpTable::with_default_handlers();
        let operators = OperatorRegistry::new();
        let report = sched.step(&mut gc, globals, &operators, &table, 0, UNLIMITED_BUDGET);

        assert_eq!(report.ran, 1);
        assert_eq!(report.destroyed.len(), 1);
        assert_eq!(report.destroyed[0].1, DestroyReason::Returned);
        assert_eq!(sched.running_count(), 0);
    }

    #[test]
    fn sleeping_threads_wake_once_their_time_elapses() {
        let mut gc = Collector::new(GcConfig::default());
        let globals = gc.alloc_table();
        let func = make_script(&mut gc, halt_bytecode(), 0, 0);
        let mut sched = Scheduler::new();
        let id = sched.spawn(&gc, func, Variant::Null, &[], 256, 4096).unwrap();
        sched.running.clear();
        sched.sleeping.push(SleepEntry { wake_time_ms: 1000, id });

        let table = JumpTable::with_default_handlers();
        let operators = OperatorRegistry::new();
        let report = sched.step(&mut gc, globals, &operators, &table, 500, UNLIMITED_BUDGET);
        assert_eq!(report.ran, 0);
        assert_eq!(sched.sleeping_count(), 1);

        let report = sched.step(&mut gc, globals, &operators, &table, 1500, UNLIMITED_BUDGET);
        assert_eq!(report.ran, 1);
    }

    #[test]
    fn killed_threads_found_in_a_queue_are_reaped_without_running() {
        let mut gc = Collector::new(GcConfig::default());
        let globals = gc.alloc_table();
        let func = make_script(&mut gc, halt_bytecode(), 0, 0);
        let mut sched = Scheduler::new();
        let id = sched.spawn(&gc, func, Variant::Null, &[], 256, 4096).unwrap();
        sched.kill(id);

        let table = JumpTable::with_default_handlers();
        let operators = OperatorRegistry::new();
        let report = sched.step(&mut gc, globals, &operators, &table, 0, UNLIMITED_BUDGET);
        assert_eq!(report.ran, 0);
        assert_eq!(report.destroyed, vec![(id, DestroyReason::Killed)]);
    }
}
