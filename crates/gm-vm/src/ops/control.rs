//! Calls, returns, branches, loop iteration and explicit yield.

use crate::engine::{ExecState, Flow};
use crate::error::VmError;
use crate::frame::CallFrame;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use gm_value::OpCode;
use crate::VmResult;
use gm_value::{FunctionObject, Object, Variant, VariantKey, YieldReason};

/// Pops `nargs` operands in push order (they were pushed arg0..argN-1, so
/// the last pop is arg0) then the bound `this` value and the callee.
fn call(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let nargs = inst.operand as usize;
    let mut args = Vec::with_capacity(nargs);
    for _ in 0..nargs {
        args.push(state.thread.pop()?);
    }
    args.reverse();
    let this_value = state.thread.pop()?;
    let callee = state.thread.pop()?;
    let handle = match callee {
        Variant::Function(h) => h,
        _ => return Err(VmError::NotCallable),
    };
    let function = match state.gc.heap().get(handle) {
        Some(Object::Function(f)) => f.clone(),
        _ => return Err(VmError::NotCallable),
    };

    match function {
        FunctionObject::Native(native) => {
            let outcome = (native.func)(&args);
            match outcome {
                gm_value::NativeOutcome::Return(value) => {
                    state.thread.push(value)?;
                    Ok(Flow::Continue)
                }
                gm_value::NativeOutcome::Yield(reason) => {
                    // The call's side effect (e.g. scheduling a wake time)
                    // already happened; leave a placeholder result so the
                    // caller's stack balances once execution resumes.
                    state.thread.push(Variant::Null)?;
                    Ok(Flow::Yield(reason))
                }
            }
        }
        FunctionObject::Script(script) => {
            let base = state.thread.stack_len();
            for i in 0..script.num_params as usize {
                state.thread.push(args.get(i).copied().unwrap_or(Variant::Null))?;
            }
            for _ in script.num_params as usize..script.num_locals as usize {
                state.thread.push(Variant::Null)?;
            }
            let return_address = crate::instruction::next_address(inst.op, inst.address);
            state.thread.push_frame(CallFrame {
                return_address,
                base,
                function: handle,
                this_value,
            });
            Ok(Flow::Jump(0))
        }
    }
}

/// Pops the return value and the current frame. If no caller frame remains
/// the thread's root call has finished and execution halts.
fn ret(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let value = state.thread.pop()?;
    let frame = state.thread.pop_frame()?;
    state.thread.truncate(frame.base);
    if state.thread.depth() == 0 {
        Ok(Flow::Halt(value))
    } else {
        state.thread.push(value)?;
        Ok(Flow::Jump(frame.return_address))
    }
}

fn bra(_state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    Ok(Flow::Jump(inst.operand as u32))
}

fn brz(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let value = state.thread.pop()?;
    if value.is_truthy() {
        Ok(Flow::Continue)
    } else {
        Ok(Flow::Jump(inst.operand as u32))
    }
}

fn brnz(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let value = state.thread.pop()?;
    if value.is_truthy() {
        Ok(Flow::Jump(inst.operand as u32))
    } else {
        Ok(Flow::Continue)
    }
}

/// Branch-if-zero-keep: used for short-circuit `&&`. Leaves the falsy value
/// on the stack when taking the branch; pops and falls through otherwise.
fn brzk(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let value = state.thread.peek()?;
    if value.is_truthy() {
        state.thread.pop()?;
        Ok(Flow::Continue)
    } else {
        Ok(Flow::Jump(inst.operand as u32))
    }
}

/// Branch-if-nonzero-keep: used for short-circuit `||`.
fn brnzk(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let value = state.thread.peek()?;
    if value.is_truthy() {
        Ok(Flow::Jump(inst.operand as u32))
    } else {
        state.thread.pop()?;
        Ok(Flow::Continue)
    }
}

/// Iterates a table: expects `index` (Int) on top of an unpopped table
/// handle below it. Pushes the next key/value pair and the advanced index,
/// or exits to `operand` once the table is exhausted.
fn foreach(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let index = match state.thread.pop()? {
        Variant::Int(i) => i as usize,
        _ => return Err(VmError::TypeMismatch { expected: "int", found: gm_value::VariantType::Null }),
    };
    let table = state.thread.peek()?;
    let handle = match table.handle() {
        Some(h) => h,
        None => return Err(VmError::TypeMismatch { expected: "table", found: table.variant_type() }),
    };
    let entry = match state.gc.heap().get(handle) {
        Some(Object::Table(t)) => t.entries.get_index(index).map(|(k, v)| (k.clone(), *v)),
        _ => return Err(VmError::TypeMismatch { expected: "table", found: table.variant_type() }),
    };
    match entry {
        Some((VariantKey(key), value)) => {
            state.thread.push(key)?;
            state.thread.push(value)?;
            state.thread.push(Variant::Int((index + 1) as i32))?;
            Ok(Flow::Continue)
        }
        None => {
            state.thread.pop()?;
            Ok(Flow::Jump(inst.operand as u32))
        }
    }
}

fn yield_op(_state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    Ok(Flow::Yield(YieldReason::Sleep { wake_time_ms: 0 }))
}

pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::Call, call);
    table.register(OpCode::Return, ret);
    table.register(OpCode::Bra, bra);
    table.register(OpCode::Brz, brz);
    table.register(OpCode::Brnz, brnz);
    table.register(OpCode::Brzk, brzk);
    table.register(OpCode::Brnzk, brnzk);
    table.register(OpCode::Foreach, foreach);
    table.register(OpCode::Yield, yield_op);
}
