// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode format shared by the Sable compiler and virtual machine.
//!
//! This crate defines the instruction set ([`Opcode`] and its table), the
//! instruction codec, per-unit constant pools, the [`Executable`] unit handed
//! from compiler to VM, and its on-disk image format. It has no notion of
//! runtime values; see `sable-vm` for execution.

pub mod assembler;
pub mod constant;
pub mod disasm;
pub mod error;
pub mod executable;
pub mod image;
pub mod instruction;
pub mod opcode;

pub use assembler::Assembler;
pub use constant::{Constant, ConstantPool};
pub use disasm::disassemble;
pub use error::{BytecodeError, Result};
pub use executable::{
    Executable, FunctionDef, LineNumber, LineTable, LocalVariable, TypeTag, VariableDef,
};
pub use image::{IMAGE_MAGIC, IMAGE_VERSION, decode_image, encode_image};
pub use instruction::{Instruction, instruction_count, instructions, max_stack_need};
pub use opcode::{OPCODE_COUNT, OPCODE_TABLE, OpInfo, Opcode, OperandKind, StackDelta};
