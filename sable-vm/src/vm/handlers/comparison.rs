// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Comparison and logic opcode handlers. Results are `Int(0)` or `Int(1)`.

use std::cmp::Ordering;

use sable_bytecode::{Instruction, Opcode};

use crate::error::{Result, RuntimeError};
use crate::value::Value;
use crate::vm::Vm;

impl Vm {
    /// Execute a comparison or logic opcode.
    pub(crate) fn execute_comparison(&mut self, instr: Instruction) -> Result<()> {
        use Ordering::{Equal, Greater, Less};

        match instr.opcode {
            Opcode::EqInt => self.compare_ints(|o| o == Equal),
            Opcode::NeInt => self.compare_ints(|o| o != Equal),
            Opcode::GtInt => self.compare_ints(|o| o == Greater),
            Opcode::GeInt => self.compare_ints(|o| o != Less),
            Opcode::LtInt => self.compare_ints(|o| o == Less),
            Opcode::LeInt => self.compare_ints(|o| o != Greater),

            // IEEE comparison: every ordering against NaN is false
            Opcode::EqFloat => self.compare_floats(|a, b| a == b),
            Opcode::NeFloat => self.compare_floats(|a, b| a != b),
            Opcode::GtFloat => self.compare_floats(|a, b| a > b),
            Opcode::GeFloat => self.compare_floats(|a, b| a >= b),
            Opcode::LtFloat => self.compare_floats(|a, b| a < b),
            Opcode::LeFloat => self.compare_floats(|a, b| a <= b),

            Opcode::EqString => self.compare_strings(|o| o == Equal),
            Opcode::NeString => self.compare_strings(|o| o != Equal),
            Opcode::GtString => self.compare_strings(|o| o == Greater),
            Opcode::GeString => self.compare_strings(|o| o != Less),
            Opcode::LtString => self.compare_strings(|o| o == Less),
            Opcode::LeString => self.compare_strings(|o| o != Greater),

            Opcode::EqObject => self.compare_identity(true),
            Opcode::NeObject => self.compare_identity(false),

            Opcode::LogicalAnd => {
                let b = self.stack.pop()?.as_bool()?;
                let a = self.stack.pop()?.as_bool()?;
                self.stack.push(Value::from_bool(a && b));
                Ok(())
            }
            Opcode::LogicalOr => {
                let b = self.stack.pop()?.as_bool()?;
                let a = self.stack.pop()?.as_bool()?;
                self.stack.push(Value::from_bool(a || b));
                Ok(())
            }
            Opcode::LogicalNot => {
                let a = self.stack.pop()?.as_bool()?;
                self.stack.push(Value::from_bool(!a));
                Ok(())
            }
            op => Err(RuntimeError::Internal(format!(
                "execute_comparison: unexpected opcode {}",
                op
            ))),
        }
    }

    fn compare_ints(&mut self, test: impl FnOnce(Ordering) -> bool) -> Result<()> {
        let b = self.stack.pop()?.as_int()?;
        let a = self.stack.pop()?.as_int()?;
        self.stack.push(Value::from_bool(test(a.cmp(&b))));
        Ok(())
    }

    fn compare_floats(&mut self, test: impl FnOnce(f64, f64) -> bool) -> Result<()> {
        let b = self.stack.pop()?.as_float()?;
        let a = self.stack.pop()?.as_float()?;
        self.stack.push(Value::from_bool(test(a, b)));
        Ok(())
    }

    /// Lexicographic comparison of string contents.
    fn compare_strings(&mut self, test: impl FnOnce(Ordering) -> bool) -> Result<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let ordering = self.heap.str(a)?.cmp(self.heap.str(b)?);
        self.stack.push(Value::from_bool(test(ordering)));
        Ok(())
    }

    /// Reference identity. `nil` equals only `nil`.
    fn compare_identity(&mut self, equal: bool) -> Result<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        if !a.is_object() {
            return Err(a.mismatch("object"));
        }
        if !b.is_object() {
            return Err(b.mismatch("object"));
        }
        self.stack.push(Value::from_bool((a == b) == equal));
        Ok(())
    }
}
