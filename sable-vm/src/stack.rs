// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Operand stack for the VM.
//!
//! A pre-grown slot array plus a stack pointer. Slots at and above the stack
//! pointer are dead and never read. The engine calls [`Stack::ensure`] before
//! entering a function so that pushes inside the frame never reallocate.

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};
use crate::value::Value;

/// The VM's operand stack.
#[derive(Debug)]
pub struct Stack {
    slots: Vec<Value>,
    sp: usize,
}

impl Stack {
    /// Create a stack with `size` pre-allocated slots.
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![Value::Nil; size.max(1)],
            sp: 0,
        }
    }

    /// Number of live values.
    #[inline]
    pub fn depth(&self) -> usize {
        self.sp
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    /// Number of slots currently allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The live region `[0, sp)`.
    pub fn live(&self) -> &[Value] {
        &self.slots[..self.sp]
    }

    /// Make room for `additional` more values, growing geometrically.
    pub fn ensure(&mut self, additional: usize) {
        let needed = self.sp + additional;
        if needed > self.slots.len() {
            let new_len = needed.max(self.slots.len() * 2);
            debug!(from = self.slots.len(), to = new_len, "growing stack");
            self.slots.resize(new_len, Value::Nil);
        }
    }

    #[inline]
    pub fn push(&mut self, value: Value) {
        if self.sp == self.slots.len() {
            warn!(depth = self.sp, "stack grown outside a sized frame");
            self.ensure(1);
        }
        self.slots[self.sp] = value;
        self.sp += 1;
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.slots[self.sp])
    }

    /// Value `distance` slots below the top (0 = top).
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<Value> {
        if distance >= self.sp {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(self.slots[self.sp - 1 - distance])
    }

    /// Value at an absolute slot index.
    #[inline]
    pub fn get(&self, index: usize) -> Result<Value> {
        self.live()
            .get(index)
            .copied()
            .ok_or(RuntimeError::InvalidStackAccess(index as isize))
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        if index >= self.sp {
            return Err(RuntimeError::InvalidStackAccess(index as isize));
        }
        self.slots[index] = value;
        Ok(())
    }

    /// Value at a signed offset from a frame base.
    pub fn get_at(&self, base: usize, offset: isize) -> Result<Value> {
        self.get(Self::resolve(base, offset)?)
    }

    pub fn set_at(&mut self, base: usize, offset: isize, value: Value) -> Result<()> {
        self.set(Self::resolve(base, offset)?, value)
    }

    fn resolve(base: usize, offset: isize) -> Result<usize> {
        base.checked_add_signed(offset)
            .ok_or(RuntimeError::InvalidStackAccess(base as isize + offset))
    }

    /// The top `n` values, bottom first.
    pub fn top(&self, n: usize) -> Result<&[Value]> {
        if n > self.sp {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(&self.slots[self.sp - n..self.sp])
    }

    /// Pop the top `n` values, bottom first.
    pub fn pop_n(&mut self, n: usize) -> Result<SmallVec<[Value; 4]>> {
        let values = SmallVec::from_slice(self.top(n)?);
        self.sp -= n;
        Ok(values)
    }

    /// Overwrite the top `n` values with `values`, which may differ in length.
    pub fn replace_top(&mut self, n: usize, values: &[Value]) -> Result<()> {
        if n > self.sp {
            return Err(RuntimeError::StackUnderflow);
        }
        self.sp -= n;
        self.ensure(values.len());
        self.slots[self.sp..self.sp + values.len()].copy_from_slice(values);
        self.sp += values.len();
        Ok(())
    }

    /// Drop everything at and above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.sp = self.sp.min(depth);
    }

    pub fn clear(&mut self) {
        self.sp = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_peek() {
        let mut stack = Stack::new(4);
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        assert_eq!(stack.peek(0), Ok(Value::Int(2)));
        assert_eq!(stack.peek(1), Ok(Value::Int(1)));
        assert_eq!(stack.peek(2), Err(RuntimeError::StackUnderflow));
        assert_eq!(stack.pop(), Ok(Value::Int(2)));
        assert_eq!(stack.pop(), Ok(Value::Int(1)));
        assert_eq!(stack.pop(), Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_access_outside_live_region_fails() {
        let mut stack = Stack::new(8);
        stack.push(Value::Int(1));
        assert_eq!(stack.get(1), Err(RuntimeError::InvalidStackAccess(1)));
        assert_eq!(
            stack.set(3, Value::Nil),
            Err(RuntimeError::InvalidStackAccess(3))
        );
        assert_eq!(stack.get_at(0, -1), Err(RuntimeError::InvalidStackAccess(-1)));
        assert_eq!(stack.get_at(1, -1), Ok(Value::Int(1)));
    }

    #[test]
    fn test_push_past_capacity_grows() {
        let mut stack = Stack::new(2);
        for i in 0..5 {
            stack.push(Value::Int(i));
        }
        assert_eq!(stack.depth(), 5);
        assert!(stack.capacity() >= 5);
        assert_eq!(stack.get(4), Ok(Value::Int(4)));
    }

    #[test]
    fn test_ensure_is_geometric() {
        let mut stack = Stack::new(4);
        stack.ensure(5);
        assert_eq!(stack.capacity(), 8);
        stack.ensure(100);
        assert_eq!(stack.capacity(), 100);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_replace_top_overwrites_in_place() {
        let mut stack = Stack::new(4);
        stack.push(Value::Int(9));
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        stack.replace_top(2, &[Value::Float(3.0)]).unwrap();
        assert_eq!(stack.live(), &[Value::Int(9), Value::Float(3.0)]);

        let popped = stack.pop_n(2).unwrap();
        assert_eq!(popped.as_slice(), &[Value::Int(9), Value::Float(3.0)]);
        assert!(stack.is_empty());
    }
}
