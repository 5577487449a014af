// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Minimal code-array builder.
//!
//! Hosts and tests use this to write bytecode by hand. It picks the compact
//! integer/float encodings, interns literals into a constant pool, records
//! line numbers and patches forward jumps.

use crate::constant::{Constant, ConstantPool};
use crate::error::{BytecodeError, Result};
use crate::executable::LineTable;
use crate::instruction::Instruction;
use crate::opcode::Opcode;

/// Placeholder target written by [`Assembler::emit_jump`] until patched.
const UNPATCHED_JUMP: u32 = u16::MAX as u32;

/// Builds one code array against a unit's constant pool.
pub struct Assembler<'p> {
    code: Vec<u8>,
    lines: LineTable,
    line: u32,
    constants: &'p mut ConstantPool,
}

impl<'p> Assembler<'p> {
    pub fn new(constants: &'p mut ConstantPool) -> Self {
        Self {
            code: Vec::new(),
            lines: LineTable::new(),
            line: 0,
            constants,
        }
    }

    /// Attribute subsequently emitted instructions to `line`. Line 0 records nothing.
    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    /// Offset the next instruction will be written at.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emit an instruction that takes no operand.
    pub fn emit(&mut self, opcode: Opcode) -> Result<()> {
        self.push_instruction(Instruction::new(opcode)?);
        Ok(())
    }

    /// Emit an instruction with an operand.
    pub fn emit_with(&mut self, opcode: Opcode, operand: u32) -> Result<()> {
        self.push_instruction(Instruction::with_operand(opcode, operand)?);
        Ok(())
    }

    /// Push an integer using the smallest encoding that holds it.
    pub fn push_int(&mut self, n: i64) -> Result<()> {
        match n {
            0..=0xFF => self.emit_with(Opcode::PushInt1Byte, n as u32),
            0x100..=0xFFFF => self.emit_with(Opcode::PushInt2Byte, n as u32),
            _ => {
                let idx = self.constants.add(Constant::Int(n))?;
                self.emit_with(Opcode::PushInt, idx as u32)
            }
        }
    }

    pub fn push_float(&mut self, x: f64) -> Result<()> {
        if x.to_bits() == 0.0f64.to_bits() {
            self.emit(Opcode::PushFloat0)
        } else if x == 1.0 {
            self.emit(Opcode::PushFloat1)
        } else {
            let idx = self.constants.add(Constant::Float(x))?;
            self.emit_with(Opcode::PushFloat, idx as u32)
        }
    }

    pub fn push_string(&mut self, s: &str) -> Result<()> {
        let idx = self.constants.add(Constant::String(s.to_string()))?;
        self.emit_with(Opcode::PushString, idx as u32)
    }

    /// Emit a jump with a placeholder target and return its offset for patching.
    pub fn emit_jump(&mut self, opcode: Opcode) -> Result<usize> {
        if !opcode.is_jump() {
            return Err(BytecodeError::OperandMismatch {
                mnemonic: opcode.mnemonic(),
                operand: UNPATCHED_JUMP,
            });
        }
        let at = self.offset();
        self.emit_with(opcode, UNPATCHED_JUMP)?;
        Ok(at)
    }

    /// Point the jump emitted at `at` to the current offset.
    pub fn patch_jump(&mut self, at: usize) -> Result<()> {
        let jump = Instruction::decode(&self.code, at)?;
        let target = self.offset() as u32;
        if !jump.opcode.is_jump() {
            return Err(BytecodeError::OperandMismatch {
                mnemonic: jump.opcode.mnemonic(),
                operand: target,
            });
        }
        Instruction::with_operand(jump.opcode, target)?.write_at(&mut self.code, at)
    }

    /// Finish and return the code array with its line table.
    pub fn finish(self) -> (Vec<u8>, LineTable) {
        (self.code, self.lines)
    }

    fn push_instruction(&mut self, instr: Instruction) {
        let start = self.code.len();
        instr.encode(&mut self.code);
        if self.line > 0 {
            self.lines
                .record(self.line, start as u32, instr.width() as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_int_picks_compact_encodings() {
        let mut pool = ConstantPool::new();
        let mut asm = Assembler::new(&mut pool);
        asm.push_int(7).unwrap();
        asm.push_int(300).unwrap();
        asm.push_int(-1).unwrap();
        let (code, _) = asm.finish();

        assert_eq!(
            code,
            vec![
                Opcode::PushInt1Byte as u8,
                7,
                Opcode::PushInt2Byte as u8,
                0x01,
                0x2C,
                Opcode::PushInt as u8,
                0,
                0
            ]
        );
        assert_eq!(pool.get(0).unwrap(), &Constant::Int(-1));
    }

    #[test]
    fn test_push_float_uses_shortcuts() {
        let mut pool = ConstantPool::new();
        let mut asm = Assembler::new(&mut pool);
        asm.push_float(0.0).unwrap();
        asm.push_float(1.0).unwrap();
        asm.push_float(-0.0).unwrap();
        let (code, _) = asm.finish();
        assert_eq!(code[0], Opcode::PushFloat0 as u8);
        assert_eq!(code[1], Opcode::PushFloat1 as u8);
        assert_eq!(code[2], Opcode::PushFloat as u8);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_forward_jump_is_patched_to_current_offset() {
        let mut pool = ConstantPool::new();
        let mut asm = Assembler::new(&mut pool);
        asm.push_int(1).unwrap();
        let jump = asm.emit_jump(Opcode::JumpIfFalse).unwrap();
        asm.emit(Opcode::PushNil).unwrap();
        asm.patch_jump(jump).unwrap();
        let (code, _) = asm.finish();

        let instr = Instruction::decode(&code, jump).unwrap();
        assert_eq!(instr.operand as usize, code.len());
    }

    #[test]
    fn test_patch_jump_rejects_non_jumps() {
        let mut pool = ConstantPool::new();
        let mut asm = Assembler::new(&mut pool);
        asm.emit(Opcode::Pop).unwrap();
        assert!(asm.patch_jump(0).is_err());
        assert!(asm.emit_jump(Opcode::Pop).is_err());
    }

    #[test]
    fn test_lines_are_recorded_per_instruction() {
        let mut pool = ConstantPool::new();
        let mut asm = Assembler::new(&mut pool);
        asm.set_line(4);
        asm.push_int(1).unwrap();
        asm.set_line(5);
        asm.emit(Opcode::Pop).unwrap();
        let (_, lines) = asm.finish();
        assert_eq!(lines.line_for(1), Some(4));
        assert_eq!(lines.line_for(2), Some(5));
    }
}
