//! Decoding a single instruction out of a function's bytecode stream.

use gm_value::OpCode;

/// One decoded instruction: an opcode plus its (already little-endian,
/// already fixed-up) 4-byte operand, if it has one. Operand meaning depends
/// on the opcode: a local/global slot, a jump offset, a handle, or an
/// immediate int/float bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    pub operand: i32,
    /// Byte offset of this instruction's opcode byte within the function's
    /// bytecode, used by the debugger to match breakpoints and line info.
    pub address: u32,
}

/// Errors produced while decoding a bytecode stream.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode byte {byte} at address {address}")]
    UnknownOpcode { byte: u8, address: u32 },
    #[error("truncated operand for opcode {op:?} at address {address}")]
    TruncatedOperand { op: OpCode, address: u32 },
}

/// Decodes the instruction whose opcode byte sits at `address` within
/// `code`.
pub fn decode_at(code: &[u8], address: u32) -> Result<Instruction, DecodeError> {
    let pos = address as usize;
    let byte = *code.get(pos).ok_or(DecodeError::UnknownOpcode { byte: 0, address })?;
    let op = OpCode::from_u8(byte).ok_or(DecodeError::UnknownOpcode { byte, address })?;

    let operand = if op.operand_size() == 4 {
        let start = pos + 1;
        let bytes: [u8; 4] = code
            .get(start..start + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(DecodeError::TruncatedOperand { op, address })?;
        i32::from_le_bytes(bytes)
    } else {
        0
    };

    Ok(Instruction { op, operand, address })
}

/// The address of the instruction immediately following the one at
/// `address`, given its opcode's operand size.
pub fn next_address(op: OpCode, address: u32) -> u32 {
    address + 1 + op.operand_size() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_an_operand_carrying_instruction() {
        let mut code = vec![OpCode::PushInt as u8];
        code.extend_from_slice(&42i32.to_le_bytes());
        let inst = decode_at(&code, 0).unwrap();
        assert_eq!(inst.op, OpCode::PushInt);
        assert_eq!(inst.operand, 42);
        assert_eq!(next_address(inst.op, 0), 5);
    }

    #[test]
    fn decodes_a_bare_instruction() {
        let code = vec![OpCode::Pop as u8];
        let inst = decode_at(&code, 0).unwrap();
        assert_eq!(inst.op, OpCode::Pop);
        assert_eq!(inst.operand, 0);
        assert_eq!(next_address(inst.op, 0), 1);
    }

    #[test]
    fn rejects_a_truncated_operand() {
        let code = vec![OpCode::PushInt as u8, 0, 0];
        assert!(matches!(decode_at(&code, 0), Err(DecodeError::TruncatedOperand { .. })));
    }
}
