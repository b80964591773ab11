//! Per-user-type operator overloads.
//!
//! Built-in types dispatch arithmetic/comparison/logical opcodes directly;
//! a `User` value instead looks itself up here by `(kind, opcode)`. Absent an
//! overload, the opcode raises [`crate::error::VmError::NoOperatorOverload`].

use gm_value::OpCode;
use crate::VmResult;
use gm_value::{UserKind, Variant};
use std::collections::HashMap;
use std::sync::Arc;

pub type BinaryOverload = Arc<dyn Fn(Variant, Variant) -> VmResult<Variant> + Send + Sync>;
pub type UnaryOverload = Arc<dyn Fn(Variant) -> VmResult<Variant> + Send + Sync>;

#[derive(Default)]
pub struct OperatorRegistry {
    binary: HashMap<(UserKind, OpCode), BinaryOverload>,
    unary: HashMap<(UserKind, OpCode), UnaryOverload>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_binary(&mut self, kind: UserKind, op: OpCode, overload: BinaryOverload) {
        self.binary.insert((kind, op), overload);
    }

    pub fn register_unary(&mut self, kind: UserKind, op: OpCode, overload: UnaryOverload) {
        self.unary.insert((kind, op), overload);
    }

    pub fn binary(&self, kind: UserKind, op: OpCode) -> Option<&BinaryOverload> {
        self.binary.get(&(kind, op))
    }

    pub fn unary(&self, kind: UserKind, op: OpCode) -> Option<&UnaryOverload> {
        self.unary.get(&(kind, op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_a_registered_overload() {
        let mut reg = OperatorRegistry::new();
        reg.register_binary(1, OpCode::Add, Arc::new(|a, _b| Ok(a)));
        assert!(reg.binary(1, OpCode::Add).is_some());
        assert!(reg.binary(1, OpCode::Sub).is_none());
        assert!(reg.binary(2, OpCode::Add).is_none());
    }
}
