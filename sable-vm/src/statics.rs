// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The static table: every global variable and function known to the engine.
//!
//! Globals and functions live in two dense index spaces addressed by the
//! 2-byte operands of linked code. An index, once issued, never moves.

use std::collections::HashMap;
use std::rc::Rc;

use sable_bytecode::{ConstantPool, LineTable, TypeTag, VariableDef};
use tracing::debug;

use crate::error::{LinkError, Result, RuntimeError};
use crate::native::{NativeFn, NativeFunction};
use crate::value::Value;

/// Largest number of entries in either index space.
const MAX_STATICS: usize = u16::MAX as usize + 1;

/// Index of a global variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u16);

/// Index of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u16);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FunctionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Linked code together with what it needs to run.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub code: Rc<[u8]>,
    pub constants: Rc<ConstantPool>,
    pub lines: Rc<LineTable>,
    /// Stack slots to reserve on entry, beyond the arguments.
    pub frame_size: usize,
}

impl CodeBlock {
    pub fn empty() -> Self {
        Self {
            code: Rc::from(Vec::new()),
            constants: Rc::new(ConstantPool::new()),
            lines: Rc::new(LineTable::new()),
            frame_size: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserFunction {
    pub block: CodeBlock,
    /// Declared types of the locals following the CallInfo slot.
    pub locals: Rc<[TypeTag]>,
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    User(UserFunction),
    Native(NativeFunction),
    /// Known by name only; calling it fails until an implementation is linked.
    Declared,
}

#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub package: String,
    pub name: String,
    pub param_count: usize,
    pub result_count: usize,
    pub kind: FunctionKind,
}

impl FunctionEntry {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }

    pub fn is_user(&self) -> bool {
        matches!(self.kind, FunctionKind::User(_))
    }
}

#[derive(Debug, Clone)]
pub struct GlobalVar {
    pub package: String,
    pub name: String,
    pub ty: TypeTag,
    pub value: Value,
}

type QualifiedName = (String, String);

fn key(package: &str, name: &str) -> QualifiedName {
    (package.to_string(), name.to_string())
}

/// Process-wide table of resolved globals and functions.
#[derive(Debug, Clone, Default)]
pub struct StaticTable {
    vars: Vec<GlobalVar>,
    functions: Vec<FunctionEntry>,
    var_lookup: HashMap<QualifiedName, VarId>,
    fn_lookup: HashMap<QualifiedName, FunctionId>,
}

impl StaticTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn lookup_var(&self, package: &str, name: &str) -> Option<VarId> {
        self.var_lookup.get(&key(package, name)).copied()
    }

    pub fn lookup_function(&self, package: &str, name: &str) -> Option<FunctionId> {
        self.fn_lookup.get(&key(package, name)).copied()
    }

    pub fn var(&self, id: VarId) -> Option<&GlobalVar> {
        self.vars.get(id.index())
    }

    pub fn function(&self, id: FunctionId) -> Option<&FunctionEntry> {
        self.functions.get(id.index())
    }

    /// Function entry for a raw operand, failing if it names nothing.
    pub fn function_at(&self, index: usize) -> Result<&FunctionEntry> {
        self.functions
            .get(index)
            .ok_or(RuntimeError::UnresolvedStatic(index))
    }

    pub fn var_value(&self, index: usize) -> Result<Value> {
        self.vars
            .get(index)
            .map(|v| v.value)
            .ok_or(RuntimeError::UnresolvedStatic(index))
    }

    pub fn set_var_value(&mut self, index: usize, value: Value) -> Result<()> {
        let var = self
            .vars
            .get_mut(index)
            .ok_or(RuntimeError::UnresolvedStatic(index))?;
        var.value = value;
        Ok(())
    }

    /// Current values of every global, for the GC root set.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.vars.iter().map(|v| v.value)
    }

    /// Register a global, sharing the slot of an existing one with the same name.
    ///
    /// New slots start as `Nil`; the linker writes the zero value afterwards.
    pub fn declare_var(&mut self, def: &VariableDef) -> std::result::Result<VarId, LinkError> {
        if let Some(id) = self.lookup_var(&def.package, &def.name) {
            let existing = self.vars[id.index()].ty;
            if existing != def.ty {
                return Err(LinkError::VariableTypeConflict {
                    package: def.package.clone(),
                    name: def.name.clone(),
                    existing,
                    declared: def.ty,
                });
            }
            return Ok(id);
        }

        if self.vars.len() >= MAX_STATICS {
            return Err(LinkError::TooManyStatics);
        }
        let id = VarId(self.vars.len() as u16);
        self.vars.push(GlobalVar {
            package: def.package.clone(),
            name: def.name.clone(),
            ty: def.ty,
            value: Value::Nil,
        });
        self.var_lookup.insert(key(&def.package, &def.name), id);
        Ok(id)
    }

    /// Find or create the entry for `(package, name)`, leaving an existing kind alone.
    pub fn declare_function(
        &mut self,
        package: &str,
        name: &str,
        param_count: usize,
        result_count: usize,
    ) -> std::result::Result<FunctionId, LinkError> {
        if let Some(id) = self.lookup_function(package, name) {
            return Ok(id);
        }

        if self.functions.len() >= MAX_STATICS {
            return Err(LinkError::TooManyStatics);
        }
        let id = FunctionId(self.functions.len() as u16);
        self.functions.push(FunctionEntry {
            package: package.to_string(),
            name: name.to_string(),
            param_count,
            result_count,
            kind: FunctionKind::Declared,
        });
        self.fn_lookup.insert(key(package, name), id);
        Ok(id)
    }

    /// Install a user implementation, replacing a declaration or native in place.
    pub fn set_user(
        &mut self,
        id: FunctionId,
        param_count: usize,
        result_count: usize,
        function: UserFunction,
    ) {
        if let Some(entry) = self.functions.get_mut(id.index()) {
            entry.param_count = param_count;
            entry.result_count = result_count;
            entry.kind = FunctionKind::User(function);
        }
    }

    /// Bind a host procedure. A linked user implementation takes precedence.
    pub fn define_native(
        &mut self,
        package: &str,
        name: &str,
        param_count: usize,
        result_count: usize,
        func: NativeFn,
    ) -> std::result::Result<FunctionId, LinkError> {
        let id = self.declare_function(package, name, param_count, result_count)?;
        let entry = &mut self.functions[id.index()];
        if entry.is_user() {
            debug!(package, name, "native shadowed by user implementation");
            return Ok(id);
        }
        entry.param_count = param_count;
        entry.result_count = result_count;
        entry.kind = FunctionKind::Native(NativeFunction { func });
        Ok(id)
    }
}
