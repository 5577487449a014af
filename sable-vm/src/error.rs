// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Link-time and run-time errors.

use sable_bytecode::{BytecodeError, TypeTag};
use thiserror::Error;

/// Error raised while executing bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// An object operation was applied to `nil`.
    #[error("nil pointer dereference")]
    NullPointer,

    /// Array index or struct field outside `0..len`.
    #[error("index {0} out of bounds for length {1}")]
    IndexOutOfBounds(i64, usize),

    #[error("key not found in map")]
    KeyNotFound,

    /// Integer division or remainder by zero. Float division never raises this.
    #[error("integer division by zero")]
    DivisionByZero,

    /// A function was called that is declared but has no implementation linked.
    #[error("function {package}.{name} is declared but not implemented")]
    UnresolvedFunction { package: String, name: String },

    /// A static operand names no entry in the static table.
    #[error("unresolved static index {0}")]
    UnresolvedStatic(usize),

    /// `INVOKE` on an integer that names no function.
    #[error("{0} is not a function")]
    BadFunctionValue(i64),

    #[error("bad constant index: {0}")]
    BadConstantIndex(usize),

    #[error("stack underflow")]
    StackUnderflow,

    /// Stack slot read or written outside the live region.
    #[error("invalid stack access at slot {0}")]
    InvalidStackAccess(isize),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An interface value did not hold the asserted dynamic type.
    #[error("type assertion failed: expected type {expected}, found type {found}")]
    TypeAssertion { expected: u16, found: u16 },

    /// A handle to an object that has already been collected.
    #[error("dangling object reference")]
    DanglingReference,

    #[error("invalid jump target {0}")]
    InvalidJumpTarget(usize),

    /// A function body ran off the end of its code without returning.
    #[error("function ended without RETURN")]
    MissingReturn,

    /// A host invoked a function with the wrong number of arguments.
    #[error("{name} expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A native returned a different number of values than it declares.
    #[error("native {name} returned {found} values, declared {expected}")]
    NativeResultMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Raised by `builtin.panic`.
    #[error("panic: {0}")]
    Panic(String),

    /// Writing to the output sink failed.
    #[error("i/o error: {0}")]
    Io(String),

    /// An opcode reached a handler that does not implement it.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Decode(#[from] BytecodeError),
}

/// Error raised while linking executables into the static table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Two implementations were supplied for the same function.
    #[error("function {package}.{name} is defined more than once")]
    FunctionMultipleDefine { package: String, name: String },

    #[error("entry point {package}.{name} not found")]
    EntryPointNotFound { package: String, name: String },

    /// A global was redeclared with a different type.
    #[error("global {package}.{name} declared as {declared}, already {existing}")]
    VariableTypeConflict {
        package: String,
        name: String,
        existing: TypeTag,
        declared: TypeTag,
    },

    /// A static operand indexes past the unit's own descriptor list.
    #[error("bad static index {index} at offset {offset} in package {package}")]
    BadStaticIndex {
        package: String,
        index: usize,
        offset: usize,
    },

    /// The static table cannot be addressed by a 2-byte operand any more.
    #[error("too many globals or functions")]
    TooManyStatics,

    #[error(transparent)]
    Bytecode(#[from] BytecodeError),
}

/// Where a runtime error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// `package.name` of the running function, `package.<top-level>` for
    /// top-level code, or `<host>` outside any code.
    pub function: String,
    pub pc: usize,
    pub line: Option<u32>,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} pc {}", self.function, self.pc)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

/// Error returned to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("runtime error in {location}: {error}")]
    Runtime {
        error: RuntimeError,
        location: Location,
    },
}

impl Error {
    /// The runtime error, if this is one.
    pub fn runtime(&self) -> Option<&RuntimeError> {
        match self {
            Error::Runtime { error, .. } => Some(error),
            Error::Link(_) => None,
        }
    }

    /// The link error, if this is one.
    pub fn link(&self) -> Option<&LinkError> {
        match self {
            Error::Link(error) => Some(error),
            Error::Runtime { .. } => None,
        }
    }
}

/// Result type for instruction execution.
pub type Result<T> = std::result::Result<T, RuntimeError>;
