// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for Sable bytecode.
//!
//! Executables produced by a compiler (see `sable-bytecode`) are linked into a
//! [`Vm`], which resolves their globals and functions into one static table
//! and runs them against a mark-sweep heap.
//!
//! ```no_run
//! use sable_vm::Vm;
//! # fn units() -> Vec<sable_bytecode::Executable> { Vec::new() }
//!
//! let mut vm = Vm::new();
//! vm.link(units()).unwrap();
//! let results = vm.run().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod heap;
pub mod link;
pub mod native;
pub mod object;
pub mod stack;
pub mod statics;
pub mod value;
pub mod vm;

pub use config::VmConfig;
pub use error::{Error, LinkError, Location, Result, RuntimeError};
pub use heap::{GcStats, Heap};
pub use native::{BUILTIN_PACKAGE, NativeContext, NativeFn};
pub use object::{CallInfo, Caller, MapKey, MapObject, Object};
pub use stack::Stack;
pub use statics::{FunctionId, FunctionKind, StaticTable, VarId};
pub use value::{ObjRef, Value};
pub use vm::{ENTRY_FUNCTION, ENTRY_PACKAGE, Vm};
