// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing linked Sable bytecode.

pub mod frame;
pub mod handlers;

use std::io::Write;
use std::rc::Rc;

use sable_bytecode::{Instruction, Opcode, TypeTag};

use crate::config::VmConfig;
use crate::error::{Error, LinkError, Location, Result, RuntimeError};
use crate::heap::{GcStats, Heap};
use crate::native::{NativeContext, register_builtins};
use crate::object::{Caller, Object};
use crate::stack::Stack;
use crate::statics::{CodeBlock, FunctionId, FunctionKind, StaticTable};
use crate::value::{ObjRef, Value};

pub use frame::Entered;
pub use handlers::control::ControlFlow;

/// Package of the entry function run by [`Vm::run`].
pub const ENTRY_PACKAGE: &str = "main";
/// Name of the entry function run by [`Vm::run`].
pub const ENTRY_FUNCTION: &str = "main";

/// Top-level code of a linked executable.
#[derive(Debug)]
pub(crate) struct LinkedUnit {
    pub package: String,
    pub block: CodeBlock,
    pub ran: bool,
}

/// The Sable virtual machine.
pub struct Vm {
    config: VmConfig,

    pub(crate) stack: Stack,
    pub(crate) heap: Heap,
    pub(crate) statics: StaticTable,
    pub(crate) units: Vec<LinkedUnit>,

    /// Sink for `builtin.print` and friends.
    out: Box<dyn Write>,

    // Registers of the running code
    pub(crate) block: CodeBlock,
    pub(crate) current: Caller,
    pub(crate) base: usize,
    pub(crate) pc: usize,
    /// Offset of the instruction being executed.
    pub(crate) op_pc: usize,
}

impl Vm {
    /// Create a VM with the default configuration and the builtin natives.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut statics = StaticTable::new();
        register_builtins(&mut statics);
        Self {
            config,
            stack: Stack::new(config.initial_stack_size),
            heap: Heap::new(config.gc_threshold, config.gc_threshold_increment),
            statics,
            units: Vec::new(),
            out: Box::new(std::io::stdout()),
            block: CodeBlock::empty(),
            current: Caller::Host,
            base: 0,
            pc: 0,
            op_pc: 0,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Replace the output sink (stdout by default).
    pub fn set_output(&mut self, out: impl Write + 'static) {
        self.out = Box::new(out);
    }

    /// Bind a host procedure as `package.name`.
    ///
    /// Replaces a declaration or an earlier native with the same name in
    /// place. A linked user implementation keeps precedence.
    pub fn register_native<F>(
        &mut self,
        package: &str,
        name: &str,
        param_count: usize,
        result_count: usize,
        func: F,
    ) -> std::result::Result<FunctionId, Error>
    where
        F: Fn(&mut NativeContext<'_>, &[Value]) -> Result<Vec<Value>> + 'static,
    {
        Ok(self
            .statics
            .define_native(package, name, param_count, result_count, Rc::new(func))?)
    }

    /// Run every unit's pending top-level code, then `main.main`.
    pub fn run(&mut self) -> std::result::Result<Vec<Value>, Error> {
        let entry = self
            .statics
            .lookup_function(ENTRY_PACKAGE, ENTRY_FUNCTION)
            .and_then(|id| self.statics.function(id));
        // A declaration alone does not make an entry point
        if matches!(entry.map(|f| &f.kind), None | Some(FunctionKind::Declared)) {
            return Err(Error::Link(LinkError::EntryPointNotFound {
                package: ENTRY_PACKAGE.to_string(),
                name: ENTRY_FUNCTION.to_string(),
            }));
        }
        self.run_top_level()?;
        self.invoke(ENTRY_PACKAGE, ENTRY_FUNCTION, &[])
    }

    /// Run the top-level code of every linked unit that has not run yet, in link order.
    pub fn run_top_level(&mut self) -> std::result::Result<(), Error> {
        for unit in 0..self.units.len() {
            if self.units[unit].ran {
                continue;
            }
            self.units[unit].ran = true;
            self.run_unit(unit).map_err(|e| self.fail(e))?;
        }
        Ok(())
    }

    fn run_unit(&mut self, unit: usize) -> Result<()> {
        let block = self.units[unit].block.clone();
        self.stack.clear();
        self.stack.ensure(block.frame_size);
        self.block = block;
        self.current = Caller::TopLevel(unit);
        self.base = 0;
        self.pc = 0;
        self.run_loop()?;
        self.stack.clear();
        self.block = CodeBlock::empty();
        self.current = Caller::Host;
        self.pc = 0;
        self.op_pc = 0;
        Ok(())
    }

    /// Call a linked function from the host and return its results.
    pub fn invoke(
        &mut self,
        package: &str,
        name: &str,
        args: &[Value],
    ) -> std::result::Result<Vec<Value>, Error> {
        let id = self.statics.lookup_function(package, name).ok_or_else(|| {
            LinkError::EntryPointNotFound {
                package: package.to_string(),
                name: name.to_string(),
            }
        })?;
        self.invoke_function(id, args).map_err(|e| self.fail(e))
    }

    fn invoke_function(&mut self, id: FunctionId, args: &[Value]) -> Result<Vec<Value>> {
        self.current = Caller::Host;
        self.block = CodeBlock::empty();
        self.pc = 0;
        self.op_pc = 0;

        let entry = self.statics.function_at(id.index())?;
        let (params, results) = (entry.param_count, entry.result_count);
        if args.len() != params {
            return Err(RuntimeError::ArityMismatch {
                name: entry.qualified_name(),
                expected: params,
                found: args.len(),
            });
        }

        self.stack.ensure(args.len());
        for arg in args {
            self.stack.push(*arg);
        }
        match self.call_function(id, Caller::Host)? {
            Entered::Native => Ok(self.stack.pop_n(results)?.into_vec()),
            Entered::Frame => self.run_loop(),
        }
    }

    /// The fetch-decode-execute loop. Returns when the running top-level
    /// code ends or a frame called from the host returns.
    pub(crate) fn run_loop(&mut self) -> Result<Vec<Value>> {
        loop {
            self.op_pc = self.pc;
            if self.pc >= self.block.code.len() {
                return match self.current {
                    Caller::Function(_) => Err(RuntimeError::MissingReturn),
                    _ => {
                        self.stack.truncate(self.base);
                        Ok(Vec::new())
                    }
                };
            }
            let instr = Instruction::decode(&self.block.code, self.pc)?;
            self.pc += instr.width();

            match instr.opcode {
                // Stack shuffling - handled inline
                Opcode::Pop => {
                    self.stack.pop()?;
                }
                Opcode::Duplicate => {
                    let val = self.stack.peek(0)?;
                    self.stack.push(val);
                }
                Opcode::DuplicateOffset => {
                    let val = self.stack.peek(instr.operand as usize)?;
                    self.stack.push(val);
                }

                // Literals - delegated to handler
                Opcode::PushInt1Byte
                | Opcode::PushInt2Byte
                | Opcode::PushInt
                | Opcode::PushFloat0
                | Opcode::PushFloat1
                | Opcode::PushFloat
                | Opcode::PushString
                | Opcode::PushNil => self.execute_constants(instr)?,

                // Locals, parameters and globals - delegated to handler
                Opcode::PushStackInt
                | Opcode::PushStackFloat
                | Opcode::PushStackObject
                | Opcode::PopStackInt
                | Opcode::PopStackFloat
                | Opcode::PopStackObject
                | Opcode::PushStaticInt
                | Opcode::PushStaticFloat
                | Opcode::PushStaticObject
                | Opcode::PopStaticInt
                | Opcode::PopStaticFloat
                | Opcode::PopStaticObject => self.execute_variables(instr)?,

                // Arithmetic and conversions - delegated to handler
                Opcode::AddInt
                | Opcode::AddFloat
                | Opcode::AddString
                | Opcode::SubInt
                | Opcode::SubFloat
                | Opcode::MulInt
                | Opcode::MulFloat
                | Opcode::DivInt
                | Opcode::DivFloat
                | Opcode::ModInt
                | Opcode::ModFloat
                | Opcode::MinusInt
                | Opcode::MinusFloat
                | Opcode::Increment
                | Opcode::Decrement
                | Opcode::CastIntToFloat
                | Opcode::CastFloatToInt
                | Opcode::CastBoolToString
                | Opcode::CastIntToString
                | Opcode::CastFloatToString => self.execute_arithmetic(instr)?,

                // Comparison and logic - delegated to handler
                Opcode::EqInt
                | Opcode::EqFloat
                | Opcode::EqString
                | Opcode::EqObject
                | Opcode::NeInt
                | Opcode::NeFloat
                | Opcode::NeString
                | Opcode::NeObject
                | Opcode::GtInt
                | Opcode::GtFloat
                | Opcode::GtString
                | Opcode::GeInt
                | Opcode::GeFloat
                | Opcode::GeString
                | Opcode::LtInt
                | Opcode::LtFloat
                | Opcode::LtString
                | Opcode::LeInt
                | Opcode::LeFloat
                | Opcode::LeString
                | Opcode::LogicalAnd
                | Opcode::LogicalOr
                | Opcode::LogicalNot => self.execute_comparison(instr)?,

                // Object construction and access - delegated to handler
                Opcode::PushArrayInt
                | Opcode::PushArrayFloat
                | Opcode::PushArrayObject
                | Opcode::PopArrayInt
                | Opcode::PopArrayFloat
                | Opcode::PopArrayObject
                | Opcode::PushFieldInt
                | Opcode::PushFieldFloat
                | Opcode::PushFieldObject
                | Opcode::PopFieldInt
                | Opcode::PopFieldFloat
                | Opcode::PopFieldObject
                | Opcode::PushMap
                | Opcode::PopMap
                | Opcode::NewArrayInt
                | Opcode::NewArrayFloat
                | Opcode::NewArrayObject
                | Opcode::NewArrayLiteral
                | Opcode::NewMap
                | Opcode::NewStruct
                | Opcode::BoxInterface
                | Opcode::UnboxInterface
                | Opcode::Length => self.execute_objects(instr)?,

                // Control flow - delegated to handler
                Opcode::Jump
                | Opcode::JumpIfTrue
                | Opcode::JumpIfFalse
                | Opcode::PushFunction
                | Opcode::Invoke
                | Opcode::Return => match self.execute_control(instr)? {
                    ControlFlow::Continue => {}
                    ControlFlow::Exit(results) => return Ok(results),
                },
            }
        }
    }

    /// Allocate an object, collecting first if the heap is over its threshold.
    ///
    /// The new object's children are roots of that collection.
    pub(crate) fn alloc(&mut self, object: Object) -> ObjRef {
        if self.heap.should_collect() {
            let mut pending = Vec::new();
            object.children(&mut pending);
            let roots = self
                .statics
                .values()
                .chain(self.stack.live().iter().copied())
                .filter_map(|v| v.obj_ref())
                .chain(pending);
            self.heap.collect(roots);
        }
        self.heap.alloc(object)
    }

    pub(crate) fn alloc_string(&mut self, s: String) -> Value {
        Value::Object(self.alloc(Object::String(s)))
    }

    /// Zero value of a declared type. Strings get a fresh empty string.
    pub(crate) fn zero_value(&mut self, ty: TypeTag) -> Value {
        match ty {
            TypeTag::Int => Value::Int(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::String => self.alloc_string(String::new()),
            TypeTag::Object => Value::Nil,
        }
    }

    /// Force a full collection. Returns the number of objects freed.
    pub fn collect_garbage(&mut self) -> usize {
        let roots = self
            .statics
            .values()
            .chain(self.stack.live().iter().copied())
            .filter_map(|v| v.obj_ref());
        self.heap.collect(roots)
    }

    pub fn gc_stats(&self) -> &GcStats {
        self.heap.stats()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Heap access for hosts building arguments. Allocations made here never collect.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn statics(&self) -> &StaticTable {
        &self.statics
    }

    /// Current value of the global `package.name`.
    pub fn global(&self, package: &str, name: &str) -> Option<Value> {
        let id = self.statics.lookup_var(package, name)?;
        self.statics.var(id).map(|v| v.value)
    }

    /// Number of live values on the operand stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Render a value the way `builtin.print` does.
    pub fn display(&self, value: Value) -> String {
        self.heap.display(value)
    }

    fn location(&self) -> Location {
        let function = match self.current {
            Caller::Host => "<host>".to_string(),
            Caller::TopLevel(unit) => match self.units.get(unit) {
                Some(u) => format!("{}.<top-level>", u.package),
                None => "<top-level>".to_string(),
            },
            Caller::Function(id) => match self.statics.function(id) {
                Some(f) => f.qualified_name(),
                None => format!("<function {}>", id.0),
            },
        };
        Location {
            function,
            pc: self.op_pc,
            line: self.block.lines.line_for(self.op_pc),
        }
    }

    /// Attach a location to a runtime error and abandon the running code.
    pub(crate) fn fail(&mut self, error: RuntimeError) -> Error {
        let location = self.location();
        self.stack.clear();
        self.block = CodeBlock::empty();
        self.current = Caller::Host;
        self.base = 0;
        self.pc = 0;
        self.op_pc = 0;
        Error::Runtime { error, location }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
