//! Immediate-push and plain stack manipulation opcodes.

use crate::engine::{ExecState, Flow};
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use gm_value::OpCode;
use crate::VmResult;
use gm_value::{Handle, Variant};

fn push_int(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    state.thread.push(Variant::Int(inst.operand))?;
    Ok(Flow::Continue)
}

fn push_fp(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    state.thread.push(Variant::Float(f32::from_bits(inst.operand as u32)))?;
    Ok(Flow::Continue)
}

fn push_str(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    state.thread.push(Variant::String(Handle::from_raw(inst.operand as u32)))?;
    Ok(Flow::Continue)
}

fn push_fn(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    state.thread.push(Variant::Function(Handle::from_raw(inst.operand as u32)))?;
    Ok(Flow::Continue)
}

fn push_null(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    state.thread.push(Variant::Null)?;
    Ok(Flow::Continue)
}

fn pop(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    state.thread.pop()?;
    Ok(Flow::Continue)
}

fn dup(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let top = state.thread.peek()?;
    state.thread.push(top)?;
    Ok(Flow::Continue)
}

pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::PushInt, push_int);
    table.register(OpCode::PushFp, push_fp);
    table.register(OpCode::PushStr, push_str);
    table.register(OpCode::PushFn, push_fn);
    table.register(OpCode::PushNull, push_null);
    table.register(OpCode::Pop, pop);
    table.register(OpCode::Dup, dup);
}
