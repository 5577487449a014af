// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Structured instruction decoding and encoding.
//!
//! Anything that needs to walk a code array without executing it (the
//! linker's relocation pass, frame sizing, the disassembler) goes through
//! [`Instruction::decode`] so that operand widths come from the opcode table
//! and are never computed by hand.

use crate::error::{BytecodeError, Result};
use crate::opcode::{Opcode, OperandKind, StackDelta};

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: u16,
}

impl Instruction {
    /// Create an instruction with no operand.
    pub fn new(opcode: Opcode) -> Result<Self> {
        if opcode.operand_kind() != OperandKind::None {
            return Err(BytecodeError::OperandMismatch {
                mnemonic: opcode.mnemonic(),
                operand: 0,
            });
        }
        Ok(Self { opcode, operand: 0 })
    }

    /// Create an instruction carrying an operand.
    ///
    /// Fails if the opcode takes no operand or the value does not fit its width.
    pub fn with_operand(opcode: Opcode, operand: u32) -> Result<Self> {
        let kind = opcode.operand_kind();
        if kind == OperandKind::None || operand > kind.max_operand() {
            return Err(BytecodeError::OperandMismatch {
                mnemonic: opcode.mnemonic(),
                operand,
            });
        }
        Ok(Self {
            opcode,
            operand: operand as u16,
        })
    }

    /// Encoded size in bytes.
    #[inline]
    pub fn width(&self) -> usize {
        self.opcode.width()
    }

    /// Decode the instruction starting at `offset`.
    pub fn decode(code: &[u8], offset: usize) -> Result<Self> {
        let byte = *code
            .get(offset)
            .ok_or(BytecodeError::TruncatedInstruction { offset })?;
        let opcode = Opcode::decode(byte, offset)?;
        let operand = match opcode.operand_kind().width() {
            0 => 0,
            1 => *code
                .get(offset + 1)
                .ok_or(BytecodeError::TruncatedInstruction { offset })? as u16,
            _ => {
                let bytes = code
                    .get(offset + 1..offset + 3)
                    .ok_or(BytecodeError::TruncatedInstruction { offset })?;
                u16::from_be_bytes([bytes[0], bytes[1]])
            }
        };
        Ok(Self { opcode, operand })
    }

    /// Append the encoded instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        match self.opcode.operand_kind().width() {
            0 => {}
            1 => out.push(self.operand as u8),
            _ => out.extend_from_slice(&self.operand.to_be_bytes()),
        }
    }

    /// Overwrite the instruction at `offset` in place.
    ///
    /// The bytes already there must decode to an instruction of the same
    /// width, so patching can never shift the instructions that follow.
    pub fn write_at(&self, code: &mut [u8], offset: usize) -> Result<()> {
        let existing = Self::decode(code, offset)?;
        if existing.width() != self.width() {
            return Err(BytecodeError::OperandMismatch {
                mnemonic: self.opcode.mnemonic(),
                operand: self.operand as u32,
            });
        }
        let mut encoded = Vec::with_capacity(3);
        self.encode(&mut encoded);
        code[offset..offset + encoded.len()].copy_from_slice(&encoded);
        Ok(())
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.opcode.operand_kind() == OperandKind::None {
            write!(f, "{}", self.opcode)
        } else {
            write!(f, "{} {}", self.opcode, self.operand)
        }
    }
}

/// Iterator over `(offset, instruction)` pairs of a code array.
///
/// Yields one error and then stops if the code cannot be decoded.
pub struct Instructions<'a> {
    code: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<(usize, Instruction)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.code.len() {
            return None;
        }
        let offset = self.offset;
        match Instruction::decode(self.code, offset) {
            Ok(instr) => {
                self.offset += instr.width();
                Some(Ok((offset, instr)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Walk the instructions of a code array.
pub fn instructions(code: &[u8]) -> Instructions<'_> {
    Instructions {
        code,
        offset: 0,
        failed: false,
    }
}

/// Count the instructions in a code array, validating every opcode and operand.
pub fn instruction_count(code: &[u8]) -> Result<usize> {
    let mut count = 0;
    for item in instructions(code) {
        item?;
        count += 1;
    }
    Ok(count)
}

/// Upper bound on the stack depth a code array can reach above its frame.
///
/// Sums every push; variable-effect instructions count as a single push.
pub fn max_stack_need(code: &[u8]) -> Result<usize> {
    let mut need = 0usize;
    for item in instructions(code) {
        let (_, instr) = item?;
        need += match instr.opcode.stack_delta() {
            StackDelta::Fixed(delta) if delta > 0 => delta as usize,
            StackDelta::Fixed(_) => 0,
            StackDelta::Variable => 1,
        };
    }
    Ok(need)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reads_big_endian_operands() {
        let code = [Opcode::PushInt2Byte as u8, 0x01, 0x02];
        let instr = Instruction::decode(&code, 0).unwrap();
        assert_eq!(instr.opcode, Opcode::PushInt2Byte);
        assert_eq!(instr.operand, 0x0102);
    }

    #[test]
    fn test_decode_rejects_truncated_operand() {
        let code = [Opcode::PushStaticInt as u8, 0x00];
        assert_eq!(
            Instruction::decode(&code, 0),
            Err(BytecodeError::TruncatedInstruction { offset: 0 })
        );
    }

    #[test]
    fn test_with_operand_checks_width() {
        assert!(Instruction::with_operand(Opcode::PushInt1Byte, 255).is_ok());
        assert!(Instruction::with_operand(Opcode::PushInt1Byte, 256).is_err());
        assert!(Instruction::with_operand(Opcode::AddInt, 1).is_err());
        assert!(Instruction::new(Opcode::Jump).is_err());
    }

    #[test]
    fn test_write_at_keeps_width() {
        let mut code = Vec::new();
        Instruction::with_operand(Opcode::PushStaticInt, 3)
            .unwrap()
            .encode(&mut code);
        Instruction::new(Opcode::Pop).unwrap().encode(&mut code);

        let patched = Instruction::with_operand(Opcode::PushStaticInt, 0x1234).unwrap();
        patched.write_at(&mut code, 0).unwrap();
        assert_eq!(code, vec![Opcode::PushStaticInt as u8, 0x12, 0x34, Opcode::Pop as u8]);

        let wider = Instruction::with_operand(Opcode::PushInt, 1).unwrap();
        assert!(wider.write_at(&mut code, 3).is_err());
    }

    #[test]
    fn test_iteration_stops_at_unknown_opcode() {
        let code = [Opcode::PushNil as u8, 0xFE, Opcode::Pop as u8];
        let items: Vec<_> = instructions(&code).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(
            items[1],
            Err(BytecodeError::UnknownOpcode {
                byte: 0xFE,
                offset: 1
            })
        );
    }

    #[test]
    fn test_stack_need_sums_pushes() {
        let code = [
            Opcode::PushInt1Byte as u8,
            2,
            Opcode::PushInt1Byte as u8,
            3,
            Opcode::AddInt as u8,
            Opcode::Return as u8,
        ];
        assert_eq!(max_stack_need(&code).unwrap(), 3);
        assert_eq!(instruction_count(&code).unwrap(), 4);
    }
}
