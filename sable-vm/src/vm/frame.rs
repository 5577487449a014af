// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call-frame protocol.
//!
//! A user frame looks like this, `base` being the first argument:
//!
//! ```text
//! [base .. base+n)   parameters
//! base+n             CallInfo (caller, return pc, saved base)
//! [base+n+1 ..)      declared locals, then operands
//! ```
//!
//! Natives get no frame: their arguments are read in place and overwritten
//! by their results.

use sable_bytecode::Opcode;
use tracing::trace;

use crate::error::{Result, RuntimeError};
use crate::native::{NativeContext, NativeFn};
use crate::object::{CallInfo, Caller, Object};
use crate::statics::{CodeBlock, FunctionId, FunctionKind, UserFunction};
use crate::value::Value;
use crate::vm::Vm;

/// What a call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entered {
    /// A native ran to completion; its results are on the stack.
    Native,
    /// A user frame was pushed; execution continues in the callee.
    Frame,
}

impl Vm {
    /// Call function `id` with its arguments already on the stack.
    pub(crate) fn call_function(&mut self, id: FunctionId, caller: Caller) -> Result<Entered> {
        let entry = self.statics.function_at(id.index())?;
        let (params, results) = (entry.param_count, entry.result_count);
        match &entry.kind {
            FunctionKind::Declared => Err(RuntimeError::UnresolvedFunction {
                package: entry.package.clone(),
                name: entry.name.clone(),
            }),
            FunctionKind::Native(native) => {
                let func = native.func.clone();
                self.call_native(id, &func, params, results)?;
                Ok(Entered::Native)
            }
            FunctionKind::User(user) => {
                let user = user.clone();
                self.enter_frame(id, user, params, caller)?;
                Ok(Entered::Frame)
            }
        }
    }

    fn call_native(
        &mut self,
        id: FunctionId,
        func: &NativeFn,
        params: usize,
        results: usize,
    ) -> Result<()> {
        let args = self.stack.top(params)?;
        let mut ctx = NativeContext {
            heap: &mut self.heap,
            out: &mut *self.out,
        };
        let values = func(&mut ctx, args)?;

        if values.len() != results {
            return Err(RuntimeError::NativeResultMismatch {
                name: self.function_name(id),
                expected: results,
                found: values.len(),
            });
        }
        self.stack.replace_top(params, &values)
    }

    fn enter_frame(
        &mut self,
        id: FunctionId,
        user: UserFunction,
        params: usize,
        caller: Caller,
    ) -> Result<()> {
        let base = self
            .stack
            .depth()
            .checked_sub(params)
            .ok_or(RuntimeError::StackUnderflow)?;
        self.stack.ensure(user.block.frame_size);

        let info = CallInfo {
            caller,
            return_pc: self.op_pc,
            saved_base: self.base,
        };
        let info_ref = self.alloc(Object::CallInfo(info));
        self.stack.push(Value::Object(info_ref));

        for ty in user.locals.iter() {
            let zero = self.zero_value(*ty);
            self.stack.push(zero);
        }

        trace!(function = id.0, base, depth = self.stack.depth(), "invoke");
        self.base = base;
        self.current = Caller::Function(id);
        self.block = user.block;
        self.pc = 0;
        Ok(())
    }

    /// Unwind the running user frame.
    ///
    /// Returns the results when the frame was called from the host, `None`
    /// when execution continues in the caller.
    pub(crate) fn return_from_frame(&mut self, id: FunctionId) -> Result<Option<Vec<Value>>> {
        let entry = self.statics.function_at(id.index())?;
        let (params, results) = (entry.param_count, entry.result_count);

        let info_slot = self.base + params;
        if self.stack.depth() < info_slot + 1 + results {
            return Err(RuntimeError::StackUnderflow);
        }
        let values = self.stack.pop_n(results)?;
        let info = self.call_info(self.stack.get(info_slot)?)?;
        self.stack.truncate(self.base);

        trace!(function = id.0, results, "return");
        self.base = info.saved_base;
        self.current = info.caller;
        match info.caller {
            Caller::Host => {
                self.block = CodeBlock::empty();
                return Ok(Some(values.into_vec()));
            }
            Caller::TopLevel(unit) => {
                self.block = self
                    .units
                    .get(unit)
                    .map(|u| u.block.clone())
                    .ok_or(RuntimeError::UnresolvedStatic(unit))?;
            }
            Caller::Function(caller) => {
                self.block = self.user_block(caller)?;
            }
        }
        self.pc = info.return_pc + Opcode::Invoke.width();

        for value in values {
            self.stack.push(value);
        }
        Ok(None)
    }

    fn call_info(&self, slot: Value) -> Result<CallInfo> {
        match self.heap.get(slot.as_object()?)? {
            Object::CallInfo(info) => Ok(*info),
            other => Err(RuntimeError::TypeMismatch {
                expected: "call info",
                found: other.type_name(),
            }),
        }
    }

    fn user_block(&self, id: FunctionId) -> Result<CodeBlock> {
        let entry = self.statics.function_at(id.index())?;
        match &entry.kind {
            FunctionKind::User(user) => Ok(user.block.clone()),
            _ => Err(RuntimeError::UnresolvedFunction {
                package: entry.package.clone(),
                name: entry.name.clone(),
            }),
        }
    }

    fn function_name(&self, id: FunctionId) -> String {
        self.statics
            .function(id)
            .map(|f| f.qualified_name())
            .unwrap_or_else(|| format!("<function {}>", id.0))
    }
}
