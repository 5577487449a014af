// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Executables: the unit handed from the compiler to the virtual machine.

use serde::{Deserialize, Serialize};

use crate::constant::ConstantPool;

/// Declared type of a global or local variable, used to pick its zero value.
///
/// Booleans and function values are declared `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Int,
    Float,
    String,
    Object,
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Object => "object",
        })
    }
}

/// A function-local variable (not a parameter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub name: String,
    pub ty: TypeTag,
}

impl LocalVariable {
    pub fn new(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A global variable declared or referenced by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDef {
    pub package: String,
    pub name: String,
    pub ty: TypeTag,
}

impl VariableDef {
    pub fn new(package: impl Into<String>, name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            ty,
        }
    }
}

/// One contiguous run of code compiled from a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNumber {
    /// Source line number (1-indexed).
    pub line: u32,
    pub start_pc: u32,
    pub pc_count: u32,
}

/// Monotonic mapping from code offsets to source lines. Diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineTable {
    entries: Vec<LineNumber>,
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `width` bytes starting at `start_pc` came from `line`.
    /// Extends the previous entry when it covers the same line and is adjacent.
    pub fn record(&mut self, line: u32, start_pc: u32, width: u32) {
        if let Some(last) = self.entries.last_mut()
            && last.line == line
            && last.start_pc + last.pc_count == start_pc
        {
            last.pc_count += width;
            return;
        }
        self.entries.push(LineNumber {
            line,
            start_pc,
            pc_count: width,
        });
    }

    /// Source line of the instruction at `pc`, if known.
    pub fn line_for(&self, pc: usize) -> Option<u32> {
        let pc = pc as u32;
        // entries are sorted by start_pc
        let idx = self.entries.partition_point(|e| e.start_pc <= pc);
        let entry = self.entries.get(idx.checked_sub(1)?)?;
        (pc < entry.start_pc + entry.pc_count).then_some(entry.line)
    }

    pub fn entries(&self) -> &[LineNumber] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A function declared or implemented by a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub package: String,
    pub name: String,
    pub param_count: usize,
    pub result_count: usize,
    /// False for declarations of functions implemented elsewhere
    /// (another unit, or a host native).
    pub implemented: bool,
    pub locals: Vec<LocalVariable>,
    pub code: Vec<u8>,
    pub lines: LineTable,
}

impl FunctionDef {
    /// A function implemented by this unit.
    pub fn new(
        package: impl Into<String>,
        name: impl Into<String>,
        param_count: usize,
        result_count: usize,
        code: Vec<u8>,
    ) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            param_count,
            result_count,
            implemented: true,
            locals: Vec::new(),
            code,
            lines: LineTable::new(),
        }
    }

    /// A reference to a function this unit calls but does not implement.
    pub fn declare(
        package: impl Into<String>,
        name: impl Into<String>,
        param_count: usize,
        result_count: usize,
    ) -> Self {
        Self {
            implemented: false,
            ..Self::new(package, name, param_count, result_count, Vec::new())
        }
    }

    pub fn with_locals(mut self, locals: Vec<LocalVariable>) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_lines(mut self, lines: LineTable) -> Self {
        self.lines = lines;
        self
    }

    /// `package.name`, for diagnostics.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }
}

/// A compiled unit: constants, descriptors, function bodies and top-level code.
///
/// Static operands in the code arrays index into this unit's own
/// `globals`/`functions` lists until the unit is linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executable {
    pub package: String,
    pub constants: ConstantPool,
    pub globals: Vec<VariableDef>,
    pub functions: Vec<FunctionDef>,
    pub code: Vec<u8>,
    pub lines: LineTable,
}

impl Executable {
    /// Create an empty unit for `package`.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            constants: ConstantPool::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            code: Vec::new(),
            lines: LineTable::new(),
        }
    }

    /// Add a global variable descriptor and return its unit-local index.
    pub fn add_global(&mut self, def: VariableDef) -> u16 {
        self.globals.push(def);
        (self.globals.len() - 1) as u16
    }

    /// Add a function descriptor and return its unit-local index.
    pub fn add_function(&mut self, def: FunctionDef) -> u16 {
        self.functions.push(def);
        (self.functions.len() - 1) as u16
    }

    /// Unit-local index of the function named `(package, name)`.
    pub fn function_index(&self, package: &str, name: &str) -> Option<u16> {
        self.functions
            .iter()
            .position(|f| f.package == package && f.name == name)
            .map(|i| i as u16)
    }

    /// Unit-local index of the global named `(package, name)`.
    pub fn global_index(&self, package: &str, name: &str) -> Option<u16> {
        self.globals
            .iter()
            .position(|v| v.package == package && v.name == name)
            .map(|i| i as u16)
    }
}
