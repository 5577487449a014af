// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Frame-relative and global variable access.
//!
//! Typed variants share one implementation: the compiler already proved the
//! slot holds the named kind.

use sable_bytecode::{Instruction, Opcode};

use crate::error::{Result, RuntimeError};
use crate::vm::Vm;

impl Vm {
    pub(crate) fn execute_variables(&mut self, instr: Instruction) -> Result<()> {
        let operand = instr.operand as usize;
        match instr.opcode {
            Opcode::PushStackInt | Opcode::PushStackFloat | Opcode::PushStackObject => {
                let value = self.stack.get_at(self.base, operand as isize)?;
                self.stack.push(value);
            }
            Opcode::PopStackInt | Opcode::PopStackFloat | Opcode::PopStackObject => {
                let value = self.stack.pop()?;
                self.stack.set_at(self.base, operand as isize, value)?;
            }
            Opcode::PushStaticInt | Opcode::PushStaticFloat | Opcode::PushStaticObject => {
                let value = self.statics.var_value(operand)?;
                self.stack.push(value);
            }
            Opcode::PopStaticInt | Opcode::PopStaticFloat | Opcode::PopStaticObject => {
                let value = self.stack.pop()?;
                self.statics.set_var_value(operand, value)?;
            }
            op => {
                return Err(RuntimeError::Internal(format!(
                    "execute_variables: unexpected opcode {}",
                    op
                )));
            }
        }
        Ok(())
    }
}
