// sable-vm - Common test utilities
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared helpers for building executables and running them.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! - [`UnitBuilder`] - Assemble functions and top-level code into an [`Executable`]
//! - [`main_unit`] - A `main` unit whose `main.main` is the given body
//! - [`run_units`] - Link and run units in a fresh VM
//! - [`runtime_error`] - Unwrap the runtime error of a failed run
//! - [`SharedOutput`] - Output sink whose contents tests can read back

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

pub use sable_bytecode::{
    Assembler, Executable, FunctionDef, LocalVariable, Opcode, TypeTag, VariableDef,
};
pub use sable_vm::{Error, LinkError, RuntimeError, Value, Vm, VmConfig};

/// Builds one executable unit.
pub struct UnitBuilder {
    exe: Executable,
}

impl UnitBuilder {
    pub fn new(package: &str) -> Self {
        Self {
            exe: Executable::new(package),
        }
    }

    /// Declare a global, returning its unit-local index.
    pub fn global(&mut self, package: &str, name: &str, ty: TypeTag) -> u32 {
        self.exe.add_global(VariableDef::new(package, name, ty)) as u32
    }

    /// Declare a function implemented elsewhere.
    pub fn declare(&mut self, package: &str, name: &str, params: usize, results: usize) -> u32 {
        self.exe
            .add_function(FunctionDef::declare(package, name, params, results)) as u32
    }

    /// Unit-local index the next function will get.
    pub fn next_function(&self) -> u32 {
        self.exe.functions.len() as u32
    }

    /// Implement `<unit package>.name`.
    pub fn function<F>(
        &mut self,
        name: &str,
        params: usize,
        results: usize,
        locals: &[TypeTag],
        body: F,
    ) -> u32
    where
        F: FnOnce(&mut Assembler<'_>) -> sable_bytecode::Result<()>,
    {
        let package = self.exe.package.clone();
        let mut asm = Assembler::new(&mut self.exe.constants);
        body(&mut asm).expect("assemble function");
        let (code, lines) = asm.finish();
        let locals = locals
            .iter()
            .enumerate()
            .map(|(i, ty)| LocalVariable::new(format!("l{}", i), *ty))
            .collect();
        let def = FunctionDef::new(package, name, params, results, code)
            .with_locals(locals)
            .with_lines(lines);
        self.exe.add_function(def) as u32
    }

    /// Set the unit's top-level code.
    pub fn top_level<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Assembler<'_>) -> sable_bytecode::Result<()>,
    {
        let mut asm = Assembler::new(&mut self.exe.constants);
        body(&mut asm).expect("assemble top-level code");
        let (code, lines) = asm.finish();
        self.exe.code = code;
        self.exe.lines = lines;
    }

    pub fn build(self) -> Executable {
        self.exe
    }
}

/// A `main` unit whose only function is `main.main` returning `results` values.
pub fn main_unit<F>(results: usize, locals: &[TypeTag], body: F) -> Executable
where
    F: FnOnce(&mut Assembler<'_>) -> sable_bytecode::Result<()>,
{
    let mut unit = UnitBuilder::new("main");
    unit.function("main", 0, results, locals, body);
    unit.build()
}

/// Link and run units in a fresh VM.
pub fn run_units(units: Vec<Executable>) -> Result<Vec<Value>, Error> {
    let mut vm = Vm::new();
    vm.link(units)?;
    vm.run()
}

/// Run a single `main.main` body.
pub fn run_main<F>(results: usize, body: F) -> Result<Vec<Value>, Error>
where
    F: FnOnce(&mut Assembler<'_>) -> sable_bytecode::Result<()>,
{
    run_units(vec![main_unit(results, &[], body)])
}

/// The runtime error of a failed run.
#[track_caller]
pub fn runtime_error(result: Result<Vec<Value>, Error>) -> RuntimeError {
    match result {
        Err(Error::Runtime { error, .. }) => error,
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

/// The link error of a failed link or run.
#[track_caller]
pub fn link_error<T: std::fmt::Debug>(result: Result<T, Error>) -> LinkError {
    match result {
        Err(Error::Link(error)) => error,
        other => panic!("expected a link error, got {:?}", other),
    }
}

/// An output sink shared between a VM and the test.
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    /// Install a fresh sink on `vm`.
    pub fn attach(vm: &mut Vm) -> Self {
        let out = Self::default();
        vm.set_output(out.clone());
        out
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("utf-8 output")
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
