// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Per-unit constant pool.

use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};

/// A literal referenced from bytecode by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i64),
    Float(f64),
    String(String),
}

impl Constant {
    /// Short name of the constant's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Int(_) => "int",
            Constant::Float(_) => "float",
            Constant::String(_) => "string",
        }
    }

    /// Check if two constants are the same literal.
    /// Floats compare by bit pattern so `0.0` and `-0.0` stay distinct.
    fn same_literal(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Float(x) => write!(f, "{:?}", x),
            Constant::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// Append-only constant pool addressed by 2-byte operands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstantPool {
    constants: Vec<Constant>,
}

impl ConstantPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant and return its index, reusing an identical entry if present.
    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        if let Some(i) = self.constants.iter().position(|c| c.same_literal(&constant)) {
            return Ok(i as u16);
        }

        let idx = self.constants.len();
        if idx > u16::MAX as usize {
            return Err(BytecodeError::ConstantPoolFull);
        }
        self.constants.push(constant);
        Ok(idx as u16)
    }

    /// Look up a constant.
    pub fn get(&self, index: usize) -> Result<&Constant> {
        self.constants
            .get(index)
            .ok_or(BytecodeError::BadConstantIndex(index))
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter()
    }
}

impl FromIterator<Constant> for ConstantPool {
    fn from_iter<I: IntoIterator<Item = Constant>>(iter: I) -> Self {
        Self {
            constants: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates_literals() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add(Constant::Int(7)).unwrap(), 0);
        assert_eq!(pool.add(Constant::String("x".into())).unwrap(), 1);
        assert_eq!(pool.add(Constant::Int(7)).unwrap(), 0);
        assert_eq!(pool.add(Constant::Float(0.0)).unwrap(), 2);
        assert_eq!(pool.add(Constant::Float(-0.0)).unwrap(), 3);
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_get_out_of_range_is_an_error() {
        let pool: ConstantPool = vec![Constant::Int(1)].into_iter().collect();
        assert_eq!(pool.get(0).unwrap(), &Constant::Int(1));
        assert_eq!(pool.get(1), Err(BytecodeError::BadConstantIndex(1)));
    }
}
