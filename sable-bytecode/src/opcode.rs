// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode instruction definitions and the opcode table.
//!
//! Every instruction is one opcode byte followed by zero, one or two operand
//! bytes. Operand shape and stack effect are pure data in [`OPCODE_TABLE`],
//! indexed by the opcode byte. Opcode byte values are part of the image
//! format and must not be reordered.

use crate::error::{BytecodeError, Result};

/// Operand encoding of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Opcode byte only.
    None,
    /// One raw byte.
    Byte,
    /// Two bytes, big-endian, raw integer (stack offsets, jump targets, counts).
    Short,
    /// Two bytes, big-endian, index into the unit's constant pool.
    Constant,
    /// Two bytes, big-endian, global variable index.
    /// Unit-local in an unlinked executable, static-table index after linking.
    Variable,
    /// Two bytes, big-endian, function index (unit-local before linking).
    Function,
}

impl OperandKind {
    /// Number of operand bytes following the opcode byte.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            OperandKind::None => 0,
            OperandKind::Byte => 1,
            OperandKind::Short
            | OperandKind::Constant
            | OperandKind::Variable
            | OperandKind::Function => 2,
        }
    }

    /// Largest operand value this encoding can carry.
    #[inline]
    pub const fn max_operand(self) -> u32 {
        match self {
            OperandKind::None => 0,
            OperandKind::Byte => u8::MAX as u32,
            _ => u16::MAX as u32,
        }
    }

    /// True for operands rewritten by the linker.
    #[inline]
    pub const fn is_static_ref(self) -> bool {
        matches!(self, OperandKind::Variable | OperandKind::Function)
    }
}

/// Net change in stack depth produced by one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackDelta {
    /// Always pushes/pops the same number of values.
    Fixed(i8),
    /// Depends on runtime data (call arity, literal size). Counted as one push
    /// when sizing a frame.
    Variable,
}

/// Bytecode opcodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Constants
    PushInt1Byte = 0x00,
    PushInt2Byte = 0x01,
    PushInt = 0x02,
    PushFloat0 = 0x03,
    PushFloat1 = 0x04,
    PushFloat = 0x05,
    PushString = 0x06,
    PushNil = 0x07,

    // Frame-relative locals and parameters
    PushStackInt = 0x08,
    PushStackFloat = 0x09,
    PushStackObject = 0x0A,
    PopStackInt = 0x0B,
    PopStackFloat = 0x0C,
    PopStackObject = 0x0D,

    // Globals
    PushStaticInt = 0x0E,
    PushStaticFloat = 0x0F,
    PushStaticObject = 0x10,
    PopStaticInt = 0x11,
    PopStaticFloat = 0x12,
    PopStaticObject = 0x13,

    // Array elements
    PushArrayInt = 0x14,
    PushArrayFloat = 0x15,
    PushArrayObject = 0x16,
    PopArrayInt = 0x17,
    PopArrayFloat = 0x18,
    PopArrayObject = 0x19,

    // Struct fields
    PushFieldInt = 0x1A,
    PushFieldFloat = 0x1B,
    PushFieldObject = 0x1C,
    PopFieldInt = 0x1D,
    PopFieldFloat = 0x1E,
    PopFieldObject = 0x1F,

    // Map entries
    PushMap = 0x20,
    PopMap = 0x21,

    // Arithmetic
    AddInt = 0x22,
    AddFloat = 0x23,
    AddString = 0x24,
    SubInt = 0x25,
    SubFloat = 0x26,
    MulInt = 0x27,
    MulFloat = 0x28,
    DivInt = 0x29,
    DivFloat = 0x2A,
    ModInt = 0x2B,
    ModFloat = 0x2C,
    MinusInt = 0x2D,
    MinusFloat = 0x2E,
    Increment = 0x2F,
    Decrement = 0x30,

    // Conversions
    CastIntToFloat = 0x31,
    CastFloatToInt = 0x32,
    CastBoolToString = 0x33,
    CastIntToString = 0x34,
    CastFloatToString = 0x35,

    // Comparison
    EqInt = 0x36,
    EqFloat = 0x37,
    EqString = 0x38,
    EqObject = 0x39,
    NeInt = 0x3A,
    NeFloat = 0x3B,
    NeString = 0x3C,
    NeObject = 0x3D,
    GtInt = 0x3E,
    GtFloat = 0x3F,
    GtString = 0x40,
    GeInt = 0x41,
    GeFloat = 0x42,
    GeString = 0x43,
    LtInt = 0x44,
    LtFloat = 0x45,
    LtString = 0x46,
    LeInt = 0x47,
    LeFloat = 0x48,
    LeString = 0x49,

    // Logic
    LogicalAnd = 0x4A,
    LogicalOr = 0x4B,
    LogicalNot = 0x4C,

    // Stack shuffling
    Pop = 0x4D,
    Duplicate = 0x4E,
    DuplicateOffset = 0x4F,

    // Control flow
    Jump = 0x50,
    JumpIfTrue = 0x51,
    JumpIfFalse = 0x52,
    PushFunction = 0x53,
    Invoke = 0x54,
    Return = 0x55,

    // Object construction
    NewArrayInt = 0x56,
    NewArrayFloat = 0x57,
    NewArrayObject = 0x58,
    NewArrayLiteral = 0x59,
    NewMap = 0x5A,
    NewStruct = 0x5B,
    BoxInterface = 0x5C,
    UnboxInterface = 0x5D,
    Length = 0x5E,
}

/// Number of defined opcodes. Bytes `0..OPCODE_COUNT` are all valid.
pub const OPCODE_COUNT: usize = 0x5F;

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub opcode: Opcode,
    pub mnemonic: &'static str,
    pub operand: OperandKind,
    pub stack_delta: StackDelta,
}

const fn fixed(opcode: Opcode, mnemonic: &'static str, operand: OperandKind, delta: i8) -> OpInfo {
    OpInfo {
        opcode,
        mnemonic,
        operand,
        stack_delta: StackDelta::Fixed(delta),
    }
}

const fn variable(opcode: Opcode, mnemonic: &'static str, operand: OperandKind) -> OpInfo {
    OpInfo {
        opcode,
        mnemonic,
        operand,
        stack_delta: StackDelta::Variable,
    }
}

use OperandKind::{Byte, Constant, Function, Short, Variable};

/// The opcode table, indexed by opcode byte.
pub static OPCODE_TABLE: [OpInfo; OPCODE_COUNT] = [
    fixed(Opcode::PushInt1Byte, "PUSH_INT_1BYTE", Byte, 1),
    fixed(Opcode::PushInt2Byte, "PUSH_INT_2BYTE", Short, 1),
    fixed(Opcode::PushInt, "PUSH_INT", Constant, 1),
    fixed(Opcode::PushFloat0, "PUSH_FLOAT_0", OperandKind::None, 1),
    fixed(Opcode::PushFloat1, "PUSH_FLOAT_1", OperandKind::None, 1),
    fixed(Opcode::PushFloat, "PUSH_FLOAT", Constant, 1),
    fixed(Opcode::PushString, "PUSH_STRING", Constant, 1),
    fixed(Opcode::PushNil, "PUSH_NIL", OperandKind::None, 1),
    fixed(Opcode::PushStackInt, "PUSH_STACK_INT", Short, 1),
    fixed(Opcode::PushStackFloat, "PUSH_STACK_FLOAT", Short, 1),
    fixed(Opcode::PushStackObject, "PUSH_STACK_OBJECT", Short, 1),
    fixed(Opcode::PopStackInt, "POP_STACK_INT", Short, -1),
    fixed(Opcode::PopStackFloat, "POP_STACK_FLOAT", Short, -1),
    fixed(Opcode::PopStackObject, "POP_STACK_OBJECT", Short, -1),
    fixed(Opcode::PushStaticInt, "PUSH_STATIC_INT", Variable, 1),
    fixed(Opcode::PushStaticFloat, "PUSH_STATIC_FLOAT", Variable, 1),
    fixed(Opcode::PushStaticObject, "PUSH_STATIC_OBJECT", Variable, 1),
    fixed(Opcode::PopStaticInt, "POP_STATIC_INT", Variable, -1),
    fixed(Opcode::PopStaticFloat, "POP_STATIC_FLOAT", Variable, -1),
    fixed(Opcode::PopStaticObject, "POP_STATIC_OBJECT", Variable, -1),
    fixed(Opcode::PushArrayInt, "PUSH_ARRAY_INT", OperandKind::None, -1),
    fixed(Opcode::PushArrayFloat, "PUSH_ARRAY_FLOAT", OperandKind::None, -1),
    fixed(Opcode::PushArrayObject, "PUSH_ARRAY_OBJECT", OperandKind::None, -1),
    fixed(Opcode::PopArrayInt, "POP_ARRAY_INT", OperandKind::None, -3),
    fixed(Opcode::PopArrayFloat, "POP_ARRAY_FLOAT", OperandKind::None, -3),
    fixed(Opcode::PopArrayObject, "POP_ARRAY_OBJECT", OperandKind::None, -3),
    fixed(Opcode::PushFieldInt, "PUSH_FIELD_INT", Short, 0),
    fixed(Opcode::PushFieldFloat, "PUSH_FIELD_FLOAT", Short, 0),
    fixed(Opcode::PushFieldObject, "PUSH_FIELD_OBJECT", Short, 0),
    fixed(Opcode::PopFieldInt, "POP_FIELD_INT", Short, -2),
    fixed(Opcode::PopFieldFloat, "POP_FIELD_FLOAT", Short, -2),
    fixed(Opcode::PopFieldObject, "POP_FIELD_OBJECT", Short, -2),
    fixed(Opcode::PushMap, "PUSH_MAP", OperandKind::None, -1),
    fixed(Opcode::PopMap, "POP_MAP", OperandKind::None, -3),
    fixed(Opcode::AddInt, "ADD_INT", OperandKind::None, -1),
    fixed(Opcode::AddFloat, "ADD_FLOAT", OperandKind::None, -1),
    fixed(Opcode::AddString, "ADD_STRING", OperandKind::None, -1),
    fixed(Opcode::SubInt, "SUB_INT", OperandKind::None, -1),
    fixed(Opcode::SubFloat, "SUB_FLOAT", OperandKind::None, -1),
    fixed(Opcode::MulInt, "MUL_INT", OperandKind::None, -1),
    fixed(Opcode::MulFloat, "MUL_FLOAT", OperandKind::None, -1),
    fixed(Opcode::DivInt, "DIV_INT", OperandKind::None, -1),
    fixed(Opcode::DivFloat, "DIV_FLOAT", OperandKind::None, -1),
    fixed(Opcode::ModInt, "MOD_INT", OperandKind::None, -1),
    fixed(Opcode::ModFloat, "MOD_FLOAT", OperandKind::None, -1),
    fixed(Opcode::MinusInt, "MINUS_INT", OperandKind::None, 0),
    fixed(Opcode::MinusFloat, "MINUS_FLOAT", OperandKind::None, 0),
    fixed(Opcode::Increment, "INCREMENT", OperandKind::None, 0),
    fixed(Opcode::Decrement, "DECREMENT", OperandKind::None, 0),
    fixed(Opcode::CastIntToFloat, "CAST_INT_TO_FLOAT", OperandKind::None, 0),
    fixed(Opcode::CastFloatToInt, "CAST_FLOAT_TO_INT", OperandKind::None, 0),
    fixed(Opcode::CastBoolToString, "CAST_BOOL_TO_STRING", OperandKind::None, 0),
    fixed(Opcode::CastIntToString, "CAST_INT_TO_STRING", OperandKind::None, 0),
    fixed(Opcode::CastFloatToString, "CAST_FLOAT_TO_STRING", OperandKind::None, 0),
    fixed(Opcode::EqInt, "EQ_INT", OperandKind::None, -1),
    fixed(Opcode::EqFloat, "EQ_FLOAT", OperandKind::None, -1),
    fixed(Opcode::EqString, "EQ_STRING", OperandKind::None, -1),
    fixed(Opcode::EqObject, "EQ_OBJECT", OperandKind::None, -1),
    fixed(Opcode::NeInt, "NE_INT", OperandKind::None, -1),
    fixed(Opcode::NeFloat, "NE_FLOAT", OperandKind::None, -1),
    fixed(Opcode::NeString, "NE_STRING", OperandKind::None, -1),
    fixed(Opcode::NeObject, "NE_OBJECT", OperandKind::None, -1),
    fixed(Opcode::GtInt, "GT_INT", OperandKind::None, -1),
    fixed(Opcode::GtFloat, "GT_FLOAT", OperandKind::None, -1),
    fixed(Opcode::GtString, "GT_STRING", OperandKind::None, -1),
    fixed(Opcode::GeInt, "GE_INT", OperandKind::None, -1),
    fixed(Opcode::GeFloat, "GE_FLOAT", OperandKind::None, -1),
    fixed(Opcode::GeString, "GE_STRING", OperandKind::None, -1),
    fixed(Opcode::LtInt, "LT_INT", OperandKind::None, -1),
    fixed(Opcode::LtFloat, "LT_FLOAT", OperandKind::None, -1),
    fixed(Opcode::LtString, "LT_STRING", OperandKind::None, -1),
    fixed(Opcode::LeInt, "LE_INT", OperandKind::None, -1),
    fixed(Opcode::LeFloat, "LE_FLOAT", OperandKind::None, -1),
    fixed(Opcode::LeString, "LE_STRING", OperandKind::None, -1),
    fixed(Opcode::LogicalAnd, "LOGICAL_AND", OperandKind::None, -1),
    fixed(Opcode::LogicalOr, "LOGICAL_OR", OperandKind::None, -1),
    fixed(Opcode::LogicalNot, "LOGICAL_NOT", OperandKind::None, 0),
    fixed(Opcode::Pop, "POP", OperandKind::None, -1),
    fixed(Opcode::Duplicate, "DUPLICATE", OperandKind::None, 1),
    fixed(Opcode::DuplicateOffset, "DUPLICATE_OFFSET", Short, 1),
    fixed(Opcode::Jump, "JUMP", Short, 0),
    fixed(Opcode::JumpIfTrue, "JUMP_IF_TRUE", Short, -1),
    fixed(Opcode::JumpIfFalse, "JUMP_IF_FALSE", Short, -1),
    fixed(Opcode::PushFunction, "PUSH_FUNCTION", Function, 1),
    variable(Opcode::Invoke, "INVOKE", OperandKind::None),
    variable(Opcode::Return, "RETURN", OperandKind::None),
    fixed(Opcode::NewArrayInt, "NEW_ARRAY_INT", Short, 1),
    fixed(Opcode::NewArrayFloat, "NEW_ARRAY_FLOAT", Short, 1),
    fixed(Opcode::NewArrayObject, "NEW_ARRAY_OBJECT", Short, 1),
    variable(Opcode::NewArrayLiteral, "NEW_ARRAY_LITERAL", Short),
    fixed(Opcode::NewMap, "NEW_MAP", OperandKind::None, 1),
    variable(Opcode::NewStruct, "NEW_STRUCT", Short),
    fixed(Opcode::BoxInterface, "BOX_INTERFACE", Short, 0),
    fixed(Opcode::UnboxInterface, "UNBOX_INTERFACE", Short, 0),
    fixed(Opcode::Length, "LENGTH", OperandKind::None, 0),
];

impl Opcode {
    /// Convert a raw byte to an opcode.
    #[inline]
    pub fn from_u8(byte: u8) -> Option<Self> {
        OPCODE_TABLE.get(byte as usize).map(|info| info.opcode)
    }

    /// Convert a raw byte found at `offset` to an opcode, failing on unknown bytes.
    #[inline]
    pub fn decode(byte: u8, offset: usize) -> Result<Self> {
        Self::from_u8(byte).ok_or(BytecodeError::UnknownOpcode { byte, offset })
    }

    /// The table entry for this opcode.
    #[inline]
    pub fn info(self) -> &'static OpInfo {
        &OPCODE_TABLE[self as usize]
    }

    #[inline]
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    #[inline]
    pub fn operand_kind(self) -> OperandKind {
        self.info().operand
    }

    #[inline]
    pub fn stack_delta(self) -> StackDelta {
        self.info().stack_delta
    }

    /// Encoded size of the instruction in bytes, opcode included.
    #[inline]
    pub fn width(self) -> usize {
        1 + self.operand_kind().width()
    }

    /// Returns true if the operand is an absolute jump target.
    #[inline]
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpIfTrue | Opcode::JumpIfFalse)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = BytecodeError;

    fn try_from(byte: u8) -> Result<Self> {
        Self::decode(byte, 0)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_opcode_byte() {
        for (byte, info) in OPCODE_TABLE.iter().enumerate() {
            assert_eq!(info.opcode as usize, byte, "{} is out of place", info.mnemonic);
        }
    }

    #[test]
    fn test_mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for info in OPCODE_TABLE.iter() {
            assert!(seen.insert(info.mnemonic), "duplicate {}", info.mnemonic);
        }
    }

    #[test]
    fn test_bytes_past_table_are_unknown() {
        for byte in OPCODE_COUNT..=u8::MAX as usize {
            let err = Opcode::decode(byte as u8, 7).unwrap_err();
            assert_eq!(
                err,
                BytecodeError::UnknownOpcode {
                    byte: byte as u8,
                    offset: 7
                }
            );
        }
    }

    #[test]
    fn test_widths_follow_operand_kind() {
        assert_eq!(Opcode::AddInt.width(), 1);
        assert_eq!(Opcode::PushInt1Byte.width(), 2);
        assert_eq!(Opcode::PushInt.width(), 3);
        assert_eq!(Opcode::PushStaticObject.width(), 3);
        assert_eq!(Opcode::PushFunction.width(), 3);
    }
}
