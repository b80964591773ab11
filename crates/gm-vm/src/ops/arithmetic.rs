//! Arithmetic, comparison and logical opcodes.
//!
//! Built-in numeric types coerce `Int`/`Float` mixes to `Float`; strings
//! additionally support `+` as concatenation. Anything else — including any
//! operand carrying a `User` kind — falls through to the per-kind overload
//! registry, raising [`VmError::NoOperatorOverload`] if none is registered.

use crate::engine::{ExecState, Flow};
use crate::error::VmError;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use gm_value::OpCode;
use crate::VmResult;
use gm_value::{Object, Variant};

enum Num {
    Int(i32),
    Float(f32),
}

fn as_num(v: Variant) -> Option<Num> {
    match v {
        Variant::Int(i) => Some(Num::Int(i)),
        Variant::Float(f) => Some(Num::Float(f)),
        _ => None,
    }
}

fn user_kind(v: Variant) -> Option<gm_value::UserKind> {
    match v {
        Variant::User(kind, _) => Some(kind),
        _ => None,
    }
}

/// Tries the overload registry for either operand's user kind, lhs first.
fn dispatch_binary(state: &ExecState, op: OpCode, a: Variant, b: Variant) -> VmResult<Variant> {
    for kind in [user_kind(a), user_kind(b)].into_iter().flatten() {
        if let Some(overload) = state.operators.binary(kind, op) {
            return overload(a, b);
        }
    }
    Err(VmError::NoOperatorOverload { op, kind: user_kind(a).or(user_kind(b)).unwrap_or(0) })
}

fn dispatch_unary(state: &ExecState, op: OpCode, a: Variant) -> VmResult<Variant> {
    match user_kind(a) {
        Some(kind) => match state.operators.unary(kind, op) {
            Some(overload) => overload(a),
            None => Err(VmError::NoOperatorOverload { op, kind }),
        },
        None => Err(VmError::TypeMismatch { expected: "number", found: a.variant_type() }),
    }
}

fn numeric_binary(
    state: &mut ExecState,
    op: OpCode,
    int_op: impl Fn(i32, i32) -> VmResult<i32>,
    float_op: impl Fn(f32, f32) -> VmResult<f32>,
) -> VmResult<Flow> {
    let b = state.thread.pop()?;
    let a = state.thread.pop()?;
    let result = match (as_num(a), as_num(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => Variant::Int(int_op(x, y)?),
        (Some(x), Some(y)) => {
            let fx = match x {
                Num::Int(i) => i as f32,
                Num::Float(f) => f,
            };
            let fy = match y {
                Num::Int(i) => i as f32,
                Num::Float(f) => f,
            };
            Variant::Float(float_op(fx, fy)?)
        }
        _ => dispatch_binary(state, op, a, b)?,
    };
    state.thread.push(result)?;
    Ok(Flow::Continue)
}

fn add(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let b = state.thread.pop()?;
    let a = state.thread.pop()?;
    let result = match (a, b) {
        (Variant::String(ha), Variant::String(hb)) => {
            let mut bytes = match state.gc.heap().get(ha) {
                Some(Object::String(s)) => s.bytes.to_vec(),
                _ => return Err(VmError::TypeMismatch { expected: "string", found: a.variant_type() }),
            };
            match state.gc.heap().get(hb) {
                Some(Object::String(s)) => bytes.extend_from_slice(&s.bytes),
                _ => return Err(VmError::TypeMismatch { expected: "string", found: b.variant_type() }),
            }
            Variant::String(state.gc.alloc_string(bytes))
        }
        (a, b) => match (as_num(a), as_num(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Variant::Int(x.wrapping_add(y)),
            (Some(x), Some(y)) => Variant::Float(num_to_f32(x) + num_to_f32(y)),
            _ => dispatch_binary(state, OpCode::Add, a, b)?,
        },
    };
    state.thread.push(result)?;
    Ok(Flow::Continue)
}

fn num_to_f32(n: Num) -> f32 {
    match n {
        Num::Int(i) => i as f32,
        Num::Float(f) => f,
    }
}

fn sub(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    numeric_binary(state, OpCode::Sub, |a, b| Ok(a.wrapping_sub(b)), |a, b| Ok(a - b))
}

fn mul(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    numeric_binary(state, OpCode::Mul, |a, b| Ok(a.wrapping_mul(b)), |a, b| Ok(a * b))
}

fn div(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    numeric_binary(
        state,
        OpCode::Div,
        |a, b| if b == 0 { Err(VmError::DivisionByZero) } else { Ok(a.wrapping_div(b)) },
        |a, b| if b == 0.0 { Err(VmError::DivisionByZero) } else { Ok(a / b) },
    )
}

fn modulo(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    numeric_binary(
        state,
        OpCode::Mod,
        |a, b| if b == 0 { Err(VmError::DivisionByZero) } else { Ok(a.wrapping_rem(b)) },
        |a, b| if b == 0.0 { Err(VmError::DivisionByZero) } else { Ok(a % b) },
    )
}

fn neg(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let a = state.thread.pop()?;
    let result = match as_num(a) {
        Some(Num::Int(x)) => Variant::Int(x.wrapping_neg()),
        Some(Num::Float(x)) => Variant::Float(-x),
        None => dispatch_unary(state, OpCode::Neg, a)?,
    };
    state.thread.push(result)?;
    Ok(Flow::Continue)
}

fn compare_numeric(
    state: &mut ExecState,
    op: OpCode,
    int_cmp: impl Fn(i32, i32) -> bool,
    float_cmp: impl Fn(f32, f32) -> bool,
) -> VmResult<Flow> {
    let b = state.thread.pop()?;
    let a = state.thread.pop()?;
    let truth = match (as_num(a), as_num(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => int_cmp(x, y),
        (Some(x), Some(y)) => float_cmp(num_to_f32(x), num_to_f32(y)),
        _ => dispatch_binary(state, op, a, b)?.is_truthy(),
    };
    state.thread.push(Variant::Int(truth as i32))?;
    Ok(Flow::Continue)
}

fn ceq(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let b = state.thread.pop()?;
    let a = state.thread.pop()?;
    state.thread.push(Variant::Int((a == b) as i32))?;
    Ok(Flow::Continue)
}

fn cne(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let b = state.thread.pop()?;
    let a = state.thread.pop()?;
    state.thread.push(Variant::Int((a != b) as i32))?;
    Ok(Flow::Continue)
}

fn clt(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    compare_numeric(state, OpCode::Clt, |a, b| a < b, |a, b| a < b)
}

fn cle(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    compare_numeric(state, OpCode::Cle, |a, b| a <= b, |a, b| a <= b)
}

fn cgt(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    compare_numeric(state, OpCode::Cgt, |a, b| a > b, |a, b| a > b)
}

fn cge(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    compare_numeric(state, OpCode::Cge, |a, b| a >= b, |a, b| a >= b)
}

fn and(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let b = state.thread.pop()?;
    let a = state.thread.pop()?;
    state.thread.push(Variant::Int((a.is_truthy() && b.is_truthy()) as i32))?;
    Ok(Flow::Continue)
}

fn or(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let b = state.thread.pop()?;
    let a = state.thread.pop()?;
    state.thread.push(Variant::Int((a.is_truthy() || b.is_truthy()) as i32))?;
    Ok(Flow::Continue)
}

fn not(state: &mut ExecState, _inst: Instruction) -> VmResult<Flow> {
    let a = state.thread.pop()?;
    state.thread.push(Variant::Int(!a.is_truthy() as i32))?;
    Ok(Flow::Continue)
}

pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::Add, add);
    table.register(OpCode::Sub, sub);
    table.register(OpCode::Mul, mul);
    table.register(OpCode::Div, div);
    table.register(OpCode::Mod, modulo);
    table.register(OpCode::Neg, neg);
    table.register(OpCode::Ceq, ceq);
    table.register(OpCode::Cne, cne);
    table.register(OpCode::Clt, clt);
    table.register(OpCode::Cle, cle);
    table.register(OpCode::Cgt, cgt);
    table.register(OpCode::Cge, cge);
    table.register(OpCode::And, and);
    table.register(OpCode::Or, or);
    table.register(OpCode::Not, not);
}
