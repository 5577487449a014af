// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Host-native functions.
//!
//! Natives receive their arguments as a slice of the operand stack and return
//! their results, which the engine writes back over the argument region. They
//! may allocate through [`NativeContext::heap`], which never triggers a
//! collection.

use std::io::Write;
use std::rc::Rc;

use tracing::warn;

use crate::error::{Result, RuntimeError};
use crate::heap::Heap;
use crate::statics::StaticTable;
use crate::value::Value;

/// Package the built-in natives are registered under.
pub const BUILTIN_PACKAGE: &str = "builtin";

/// Engine state a native may touch.
pub struct NativeContext<'a> {
    pub heap: &'a mut Heap,
    pub out: &'a mut dyn Write,
}

/// Signature of a host procedure.
pub type NativeFn = Rc<dyn Fn(&mut NativeContext<'_>, &[Value]) -> Result<Vec<Value>>>;

/// A native function bound into the static table.
#[derive(Clone)]
pub struct NativeFunction {
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NativeFunction")
    }
}

/// Register the `builtin` package.
pub fn register_builtins(statics: &mut StaticTable) {
    let builtins: [(&str, usize, usize, NativeFn); 5] = [
        ("print", 1, 0, Rc::new(builtin_print)),
        ("println", 1, 0, Rc::new(builtin_println)),
        ("len", 1, 1, Rc::new(builtin_len)),
        ("sqrt", 1, 1, Rc::new(builtin_sqrt)),
        ("panic", 1, 0, Rc::new(builtin_panic)),
    ];
    for (name, params, results, func) in builtins {
        if let Err(e) = statics.define_native(BUILTIN_PACKAGE, name, params, results, func) {
            warn!(name, error = %e, "builtin not registered");
        }
    }
}

fn write_out(ctx: &mut NativeContext<'_>, text: &str) -> Result<()> {
    ctx.out
        .write_all(text.as_bytes())
        .map_err(|e| RuntimeError::Io(e.to_string()))
}

fn builtin_print(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Vec<Value>> {
    let text = ctx.heap.display(args[0]);
    write_out(ctx, &text)?;
    Ok(Vec::new())
}

fn builtin_println(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Vec<Value>> {
    let mut text = ctx.heap.display(args[0]);
    text.push('\n');
    write_out(ctx, &text)?;
    Ok(Vec::new())
}

fn builtin_len(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Vec<Value>> {
    let len = ctx.heap.length(args[0])?;
    Ok(vec![Value::Int(len as i64)])
}

fn builtin_sqrt(_ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Vec<Value>> {
    Ok(vec![Value::Float(args[0].as_float()?.sqrt())])
}

fn builtin_panic(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Vec<Value>> {
    Err(RuntimeError::Panic(ctx.heap.display(args[0])))
}

#[cfg(test)]
mod tests {
    use super::*;

    type Builtin = fn(&mut NativeContext<'_>, &[Value]) -> Result<Vec<Value>>;

    fn call(f: Builtin, heap: &mut Heap, args: &[Value]) -> (Result<Vec<Value>>, String) {
        let mut out = Vec::new();
        let result = {
            let mut ctx = NativeContext {
                heap,
                out: &mut out,
            };
            f(&mut ctx, args)
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_println_writes_display_form() {
        let mut heap = Heap::new(16, 16);
        let s = heap.alloc_string("hello");
        let (result, out) = call(builtin_println, &mut heap, &[s]);
        assert_eq!(result, Ok(vec![]));
        assert_eq!(out, "hello\n");

        let (_, out) = call(builtin_print, &mut heap, &[Value::Float(2.5)]);
        assert_eq!(out, "2.5");
    }

    #[test]
    fn test_len_and_sqrt() {
        let mut heap = Heap::new(16, 16);
        let s = heap.alloc_string("four");
        assert_eq!(call(builtin_len, &mut heap, &[s]).0, Ok(vec![Value::Int(4)]));
        assert_eq!(
            call(builtin_sqrt, &mut heap, &[Value::Float(9.0)]).0,
            Ok(vec![Value::Float(3.0)])
        );
        assert_eq!(
            call(builtin_len, &mut heap, &[Value::Nil]).0,
            Err(RuntimeError::NullPointer)
        );
    }

    #[test]
    fn test_panic_carries_message() {
        let mut heap = Heap::new(16, 16);
        let msg = heap.alloc_string("boom");
        assert_eq!(
            call(builtin_panic, &mut heap, &[msg]).0,
            Err(RuntimeError::Panic("boom".into()))
        );
    }
}
