// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime values.

use crate::error::{Result, RuntimeError};

/// Handle to an object in the heap arena.
///
/// The generation distinguishes reuses of the same slot, so a handle that
/// outlives its object is detected instead of aliasing a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ObjRef {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A value on the operand stack, in a global or inside a container.
///
/// Booleans are `Int(0)`/`Int(1)` and function values are `Int(function index)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    Int(i64),
    Float(f64),
    Object(ObjRef),
    /// The null object reference.
    #[default]
    Nil,
}

impl Value {
    #[inline]
    pub fn from_bool(b: bool) -> Self {
        Value::Int(b as i64)
    }

    /// True for object references, `Nil` included.
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Nil)
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The referenced object, if any.
    #[inline]
    pub fn obj_ref(&self) -> Option<ObjRef> {
        match self {
            Value::Object(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            other => Err(other.mismatch("float")),
        }
    }

    /// Int truth value: zero is false, anything else true.
    pub fn as_bool(&self) -> Result<bool> {
        self.as_int().map(|n| n != 0)
    }

    /// The referenced object. `Nil` is a null pointer.
    pub fn as_object(&self) -> Result<ObjRef> {
        match self {
            Value::Object(r) => Ok(*r),
            Value::Nil => Err(RuntimeError::NullPointer),
            other => Err(other.mismatch("object")),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Object(_) => "object",
            Value::Nil => "nil",
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_is_an_object_but_not_a_reference() {
        assert!(Value::Nil.is_object());
        assert_eq!(Value::Nil.obj_ref(), None);
        assert_eq!(Value::Nil.as_object(), Err(RuntimeError::NullPointer));
    }

    #[test]
    fn test_accessors_report_mismatches() {
        assert_eq!(Value::Int(3).as_int(), Ok(3));
        assert_eq!(
            Value::Float(1.5).as_int(),
            Err(RuntimeError::TypeMismatch {
                expected: "int",
                found: "float"
            })
        );
        assert_eq!(
            Value::Int(1).as_object(),
            Err(RuntimeError::TypeMismatch {
                expected: "object",
                found: "int"
            })
        );
        assert_eq!(Value::from_bool(true).as_bool(), Ok(true));
    }
}
