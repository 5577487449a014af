// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arithmetic and conversion opcode handlers.

use sable_bytecode::{Instruction, Opcode};

use crate::error::{Result, RuntimeError};
use crate::heap::format_float;
use crate::value::Value;
use crate::vm::Vm;

impl Vm {
    /// Execute an arithmetic or conversion opcode.
    pub(crate) fn execute_arithmetic(&mut self, instr: Instruction) -> Result<()> {
        match instr.opcode {
            Opcode::AddInt => self.binary_int_op(|a, b| Ok(a.wrapping_add(b))),
            Opcode::SubInt => self.binary_int_op(|a, b| Ok(a.wrapping_sub(b))),
            Opcode::MulInt => self.binary_int_op(|a, b| Ok(a.wrapping_mul(b))),
            Opcode::DivInt => self.binary_int_op(|a, b| {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Ok(a.wrapping_div(b))
            }),
            Opcode::ModInt => self.binary_int_op(|a, b| {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Ok(a.wrapping_rem(b))
            }),

            // IEEE semantics: division by zero yields an infinity or NaN
            Opcode::AddFloat => self.binary_float_op(|a, b| a + b),
            Opcode::SubFloat => self.binary_float_op(|a, b| a - b),
            Opcode::MulFloat => self.binary_float_op(|a, b| a * b),
            Opcode::DivFloat => self.binary_float_op(|a, b| a / b),
            Opcode::ModFloat => self.binary_float_op(|a, b| a % b),

            Opcode::AddString => self.execute_concat(),

            Opcode::MinusInt => self.unary_op(|v| Ok(Value::Int(v.as_int()?.wrapping_neg()))),
            Opcode::MinusFloat => self.unary_op(|v| Ok(Value::Float(-v.as_float()?))),
            Opcode::Increment => self.unary_op(|v| Ok(Value::Int(v.as_int()?.wrapping_add(1)))),
            Opcode::Decrement => self.unary_op(|v| Ok(Value::Int(v.as_int()?.wrapping_sub(1)))),

            Opcode::CastIntToFloat => self.unary_op(|v| Ok(Value::Float(v.as_int()? as f64))),
            // Saturating; NaN becomes 0
            Opcode::CastFloatToInt => self.unary_op(|v| Ok(Value::Int(v.as_float()? as i64))),
            Opcode::CastBoolToString => {
                let b = self.stack.pop()?.as_bool()?;
                let s = if b { "true" } else { "false" };
                let value = self.alloc_string(s.to_string());
                self.stack.push(value);
                Ok(())
            }
            Opcode::CastIntToString => {
                let n = self.stack.pop()?.as_int()?;
                let value = self.alloc_string(n.to_string());
                self.stack.push(value);
                Ok(())
            }
            Opcode::CastFloatToString => {
                let x = self.stack.pop()?.as_float()?;
                let value = self.alloc_string(format_float(x));
                self.stack.push(value);
                Ok(())
            }
            op => Err(RuntimeError::Internal(format!(
                "execute_arithmetic: unexpected opcode {}",
                op
            ))),
        }
    }

    fn binary_int_op<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(i64, i64) -> Result<i64>,
    {
        let b = self.stack.pop()?.as_int()?;
        let a = self.stack.pop()?.as_int()?;
        self.stack.push(Value::Int(op(a, b)?));
        Ok(())
    }

    fn binary_float_op<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let b = self.stack.pop()?.as_float()?;
        let a = self.stack.pop()?.as_float()?;
        self.stack.push(Value::Float(op(a, b)));
        Ok(())
    }

    fn unary_op<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(Value) -> Result<Value>,
    {
        let val = self.stack.pop()?;
        self.stack.push(op(val)?);
        Ok(())
    }

    /// Concatenate two strings. The operands stay on the stack until the
    /// result is allocated.
    fn execute_concat(&mut self) -> Result<()> {
        let b = self.stack.peek(0)?;
        let a = self.stack.peek(1)?;
        let mut joined = self.heap.str(a)?.to_string();
        joined.push_str(self.heap.str(b)?);
        let value = self.alloc_string(joined);
        self.stack.replace_top(2, &[value])
    }
}
