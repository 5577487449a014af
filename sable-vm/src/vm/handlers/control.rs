// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Control flow opcode handlers: jumps, calls and returns.

use sable_bytecode::{Instruction, Opcode};

use crate::error::{Result, RuntimeError};
use crate::object::Caller;
use crate::statics::FunctionId;
use crate::value::Value;
use crate::vm::Vm;

/// What the dispatch loop does after a control instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    /// Keep executing at the (possibly updated) pc.
    Continue,
    /// Leave the dispatch loop with these results.
    Exit(Vec<Value>),
}

impl Vm {
    /// Execute a control flow opcode.
    pub(crate) fn execute_control(&mut self, instr: Instruction) -> Result<ControlFlow> {
        match instr.opcode {
            Opcode::Jump => self.jump(instr.operand)?,
            Opcode::JumpIfTrue => {
                if self.stack.pop()?.as_bool()? {
                    self.jump(instr.operand)?;
                }
            }
            Opcode::JumpIfFalse => {
                if !self.stack.pop()?.as_bool()? {
                    self.jump(instr.operand)?;
                }
            }
            Opcode::PushFunction => self.stack.push(Value::Int(instr.operand as i64)),
            Opcode::Invoke => self.execute_invoke()?,
            Opcode::Return => return self.execute_return(),
            op => {
                return Err(RuntimeError::Internal(format!(
                    "execute_control: unexpected opcode {}",
                    op
                )));
            }
        }
        Ok(ControlFlow::Continue)
    }

    fn jump(&mut self, target: u16) -> Result<()> {
        let target = target as usize;
        // Jumping to the end is how code falls off its last instruction
        if target > self.block.code.len() {
            return Err(RuntimeError::InvalidJumpTarget(target));
        }
        self.pc = target;
        Ok(())
    }

    /// `[args.., fn] -> [results..]`
    fn execute_invoke(&mut self) -> Result<()> {
        let callee = self.stack.pop()?;
        let raw = callee.as_int()?;
        let id = usize::try_from(raw)
            .ok()
            .filter(|id| *id < self.statics.function_count())
            .ok_or(RuntimeError::BadFunctionValue(raw))?;
        self.call_function(FunctionId(id as u16), self.current)?;
        Ok(())
    }

    fn execute_return(&mut self) -> Result<ControlFlow> {
        match self.current {
            Caller::Function(id) => Ok(match self.return_from_frame(id)? {
                Some(results) => ControlFlow::Exit(results),
                None => ControlFlow::Continue,
            }),
            // Top-level code ends its unit's run
            Caller::TopLevel(_) | Caller::Host => {
                self.stack.truncate(self.base);
                Ok(ControlFlow::Exit(Vec::new()))
            }
        }
    }
}
