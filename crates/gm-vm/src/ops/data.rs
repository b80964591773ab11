//! Local/global/dot/index storage opcodes.

use crate::engine::{ExecState, Flow};
use crate::error::VmError;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use gm_value::OpCode;
use crate::VmResult;
use gm_value::{Handle, Object, Variant, VariantKey};

fn local_index(state: &ExecState, operand: i32) -> VmResult<usize> {
    let base = state.thread.current_frame()?.base;
    Ok(base + operand as usize)
}

fn get_local(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let index = local_index(state, inst.operand)?;
    let value = state.thread.get(index)?;
    state.thread.push(value)?;
    Ok(Flow::Continue)
}

fn set_local(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let index = local_index(state, inst.operand)?;
    let value = state.thread.pop()?;
    state.thread.set(index, value)?;
    Ok(Flow::Continue)
}

/// Looks up `key` inside `container_handle`'s table, pushing the value or
/// `Null` on a missing key — a failed dot/index lookup is non-fatal.
fn table_get(state: &mut ExecState, container: Handle, key: Variant) -> VmResult<Variant> {
    match state.gc.heap().get(container) {
        Some(Object::Table(t)) => Ok(t.entries.get(&VariantKey(key)).copied().unwrap_or(Variant::Null)),
        _ => Err(VmError::TypeMismatch {
            expected: "table",
            found: Variant::Null.variant_type(),
        }),
    }
}

/// Sets `key` to `value` inside `container_handle`'s table, re-greying the
/// table through the write barrier if it had already been blackened this
/// cycle and `value` is a reference.
fn table_set(state: &mut ExecState, container: Handle, key: Variant, value: Variant) -> VmResult<()> {
    match state.gc.heap_mut().get_mut(container).and_then(Object::as_table_mut) {
        Some(t) => {
            t.entries.set(VariantKey(key), value);
        }
        None => {
            return Err(VmError::TypeMismatch {
                expected: "table",
                found: value.variant_type(),
            })
        }
    }
    if let Some(referent) = value.handle() {
        state.gc.write_barrier(container, referent);
    }
    Ok(())
}

fn get_global(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let key = Variant::String(Handle::from_raw(inst.operand as u32));
    let globals = state.globals;
    let value = table_get(state, globals, key)?;
    state.thread.push(value)?;
    Ok(Flow::Continue)
}

fn set_global(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let key = Variant::String(Handle::from_raw(inst.operand as u32));
    let value = state.thread.pop()?;
    let globals = state.globals;
    table_set(state, globals, key, value)?;
    Ok(Flow::Continue)
}

fn get_dot(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let key = Variant::String(Handle::from_raw(inst.operand as u32));
    let receiver = state.thread.pop()?;
    let value = match receiver.handle() {
        Some(h) => table_get(state, h, key)?,
        None => Variant::Null,
    };
    state.thread.push(value)?;
    Ok(Flow::Continue)
}

fn set_dot(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let key = Variant::String(Handle::from_raw(inst.operand as u32));
    let value = state.thread.pop()?;
    let receiver = state.thread.pop()?;
    if let Some(h) = receiver.handle() {
        table_set(state, h, key, value)?;
    }
    Ok(Flow::Continue)
}

fn get_this(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let key = Variant::String(Handle::from_raw(inst.operand as u32));
    let this_value = state.thread.current_frame()?.this_value;
    let value = match this_value.handle() {
        Some(h) => table_get(state, h, key)?,
        None => Variant::Null,
    };
    state.thread.push(value)?;
    Ok(Flow::Continue)
}

fn set_this(state: &mut ExecState, inst: Instruction) -> VmResult<Flow> {
    let key = Variant::String(Handle::from_raw(inst.operand as u32));
    let value = state.thread.pop()?;
    let this_value = state.thread.current_frame()?.this_value;
    if let Some(h) = this_value.handle() {
        table_set(state, h, key, value)?;
    }
    Ok(Flow::Continue)
}

fn get_index(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let key = state.thread.pop()?;
    let receiver = state.thread.pop()?;
    let value = match receiver.handle() {
        Some(h) => table_get(state, h, key)?,
        None => Variant::Null,
    };
    state.thread.push(value)?;
    Ok(Flow::Continue)
}

fn set_index(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let value = state.thread.pop()?;
    let key = state.thread.pop()?;
    let receiver = state.thread.pop()?;
    if let Some(h) = receiver.handle() {
        table_set(state, h, key, value)?;
    }
    Ok(Flow::Continue)
}

fn new_table(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let handle = state.gc.alloc_table();
    state.thread.push(Variant::Table(handle))?;
    Ok(Flow::Continue)
}

pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::GetLocal, get_local);
    table.register(OpCode::SetLocal, set_local);
    table.register(OpCode::GetGlobal, get_global);
    table.register(OpCode::SetGlobal, set_global);
    table.register(OpCode::GetDot, get_dot);
    table.register(OpCode::SetDot, set_dot);
    table.register(OpCode::GetThis, get_this);
    table.register(OpCode::SetThis, set_this);
    table.register(OpCode::GetIndex, get_index);
    table.register(OpCode::SetIndex, set_index);
    table.register(OpCode::NewTable, new_table);
}
