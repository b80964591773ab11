//! Drives a single thread's instruction loop.

use crate::error::VmError;
use crate::instruction::{decode_at, next_address};
use crate::jump_table::JumpTable;
use crate::registry::OperatorRegistry;
use crate::thread::{Thread, ThreadState};
use crate::VmResult;
use gm_gc::Collector;
use gm_value::{FunctionObject, Handle, Variant, YieldReason};

/// Everything an opcode handler needs: the executing thread, the collector
/// (for heap reads/writes and new allocations), the globals table, and the
/// operator overload registry.
pub struct ExecState<'a> {
    pub thread: &'a mut Thread,
    pub gc: &'a mut Collector,
    pub globals: Handle,
    pub operators: &'a OperatorRegistry,
}

/// What a handler wants the engine to do next.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Advance past this instruction normally.
    Continue,
    /// Set the instruction pointer directly (branches, calls, returns).
    Jump(u32),
    /// The thread's root call has returned; it's done.
    Halt(Variant),
    /// Suspend the thread before this instruction's effect completes.
    Yield(YieldReason),
}

/// Why [`run_thread`] stopped running a thread.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The opcode budget ran out; the thread can keep running next step.
    BudgetExhausted,
    /// The thread's root function returned; it should be disposed.
    Returned(Variant),
    /// The thread asked to suspend.
    Yielded(YieldReason),
    /// The thread hit the debugger's break condition.
    Broke,
}

/// The seam a debug session hooks into to observe and gate execution,
/// without this crate depending on the debug wire protocol. `gm-debug`
/// implements this over its own side table of per-thread stepping state.
pub trait DebugHook {
    /// Called before decoding the instruction at `address` in the thread's
    /// current frame (`depth` deep, running `function`). Returning `true`
    /// parks the thread for this step without executing anything.
    fn should_break(&mut self, gc: &Collector, thread_id: u32, depth: usize, address: u32, function: Handle) -> bool;
    /// Called right after a `CALL` pushes a new frame.
    fn on_call(&mut self, thread_id: u32, depth: usize);
    /// Called right after a `RETURN` pops a frame; `depth` is the depth
    /// after the pop.
    fn on_return(&mut self, thread_id: u32, depth: usize);
}

/// Runs `thread` for up to `opcode_budget` instructions (or until it
/// suspends), starting from its current instruction pointer and frame.
pub fn run_thread(
    gc: &mut Collector,
    globals: Handle,
    operators: &OperatorRegistry,
    table: &JumpTable,
    thread: &mut Thread,
    opcode_budget: usize,
) -> VmResult<RunOutcome> {
    run_thread_with_hook(gc, globals, operators, table, thread, opcode_budget, None)
}

/// Like [`run_thread`], but consults `hook` (if present) before each
/// instruction and on call/return boundaries, letting a debug session park
/// the thread at a breakpoint or step target.
pub fn run_thread_with_hook(
    gc: &mut Collector,
    globals: Handle,
    operators: &OperatorRegistry,
    table: &JumpTable,
    thread: &mut Thread,
    opcode_budget: usize,
    mut hook: Option<&mut dyn DebugHook>,
) -> VmResult<RunOutcome> {
    for _ in 0..opcode_budget {
        let frame = *thread.current_frame()?;

        if let Some(hook) = hook.as_deref_mut() {
            if hook.should_break(gc, thread.id, thread.depth(), thread.ip, frame.function) {
                return Ok(RunOutcome::Broke);
            }
        }

        let bytecode = match gc.heap().get(frame.function) {
            Some(gm_value::Object::Function(FunctionObject::Script(f))) => f.bytecode.clone(),
            _ => return Err(VmError::NotCallable),
        };

        let instruction = decode_at(&bytecode, thread.ip).map_err(|_| VmError::NotCallable)?;

        let mut state = ExecState {
            thread: &mut *thread,
            gc: &mut *gc,
            globals,
            operators,
        };
        let flow = table.execute(&mut state, instruction)?;

        match flow {
            Flow::Continue => {
                thread.ip = next_address(instruction.op, instruction.address);
            }
            Flow::Jump(addr) => {
                thread.ip = addr;
                if let Some(hook) = hook.as_deref_mut() {
                    match instruction.op {
                        gm_value::OpCode::Call => hook.on_call(thread.id, thread.depth()),
                        gm_value::OpCode::Return => hook.on_return(thread.id, thread.depth()),
                        _ => {}
                    }
                }
            }
            Flow::Halt(value) => {
                thread.state = ThreadState::Killed;
                return Ok(RunOutcome::Returned(value));
            }
            Flow::Yield(reason) => {
                match reason {
                    YieldReason::Sleep { wake_time_ms } => {
                        thread.state = ThreadState::Sleeping;
                        thread.wake_time_ms = wake_time_ms;
                    }
                    YieldReason::Block { signal } => {
                        thread.state = ThreadState::Blocked;
                        thread.blocked_signal = Some(signal);
                    }
                }
                thread.ip = next_address(instruction.op, instruction.address);
                return Ok(RunOutcome::Yielded(reason));
            }
        }
    }
    Ok(RunOutcome::BudgetExhausted)
}
