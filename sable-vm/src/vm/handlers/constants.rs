// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Literal opcode handlers.

use sable_bytecode::{BytecodeError, Constant, Instruction, Opcode};

use crate::error::{Result, RuntimeError};
use crate::value::Value;
use crate::vm::Vm;

impl Vm {
    /// Execute a literal push.
    pub(crate) fn execute_constants(&mut self, instr: Instruction) -> Result<()> {
        let value = match instr.opcode {
            Opcode::PushInt1Byte | Opcode::PushInt2Byte => Value::Int(instr.operand as i64),
            Opcode::PushInt => match self.constant(instr.operand)? {
                Constant::Int(n) => Value::Int(*n),
                other => return Err(constant_mismatch("int", other)),
            },
            Opcode::PushFloat0 => Value::Float(0.0),
            Opcode::PushFloat1 => Value::Float(1.0),
            Opcode::PushFloat => match self.constant(instr.operand)? {
                Constant::Float(x) => Value::Float(*x),
                other => return Err(constant_mismatch("float", other)),
            },
            Opcode::PushString => {
                let s = match self.constant(instr.operand)? {
                    Constant::String(s) => s.clone(),
                    other => return Err(constant_mismatch("string", other)),
                };
                self.alloc_string(s)
            }
            Opcode::PushNil => Value::Nil,
            op => {
                return Err(RuntimeError::Internal(format!(
                    "execute_constants: unexpected opcode {}",
                    op
                )));
            }
        };
        self.stack.push(value);
        Ok(())
    }

    fn constant(&self, index: u16) -> Result<&Constant> {
        self.block
            .constants
            .get(index as usize)
            .map_err(|e| match e {
                BytecodeError::BadConstantIndex(i) => RuntimeError::BadConstantIndex(i),
                other => RuntimeError::Decode(other),
            })
    }
}

fn constant_mismatch(expected: &'static str, found: &Constant) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}
