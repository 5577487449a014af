// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Errors produced while decoding, encoding or loading bytecode.

use thiserror::Error;

/// Error raised by the bytecode layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    /// A byte that names no opcode was found where an instruction should start.
    #[error("unknown opcode 0x{byte:02X} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    /// An instruction's operand runs past the end of the code array.
    #[error("truncated instruction at offset {offset}")]
    TruncatedInstruction { offset: usize },

    /// An operand was supplied that the opcode's encoding cannot carry.
    #[error("operand {operand} does not fit the encoding of {mnemonic}")]
    OperandMismatch {
        mnemonic: &'static str,
        operand: u32,
    },

    /// Constant pool lookup out of range.
    #[error("bad constant index: {0}")]
    BadConstantIndex(usize),

    /// The constant pool cannot be addressed by a 2-byte operand any more.
    #[error("constant pool is full")]
    ConstantPoolFull,

    /// An image did not start with the expected magic bytes.
    #[error("not a sable image (bad magic)")]
    BadMagic,

    /// An image was written by an incompatible format version.
    #[error("unsupported image version {0}")]
    UnsupportedVersion(u16),

    /// The image body could not be (de)serialised.
    #[error("image error: {0}")]
    Image(String),
}

/// Result type for bytecode operations.
pub type Result<T> = std::result::Result<T, BytecodeError>;
