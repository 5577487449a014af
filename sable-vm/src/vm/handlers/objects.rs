// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Object construction and element access.

use sable_bytecode::{Instruction, Opcode};

use crate::error::{Result, RuntimeError};
use crate::object::{MapObject, Object};
use crate::value::Value;
use crate::vm::Vm;

/// Check `index` against a container length.
fn checked_index(index: i64, len: usize) -> Result<usize> {
    if index < 0 || index as u64 >= len as u64 {
        return Err(RuntimeError::IndexOutOfBounds(index, len));
    }
    Ok(index as usize)
}

impl Vm {
    /// Execute an object opcode.
    pub(crate) fn execute_objects(&mut self, instr: Instruction) -> Result<()> {
        let operand = instr.operand as usize;
        match instr.opcode {
            Opcode::PushArrayInt | Opcode::PushArrayFloat | Opcode::PushArrayObject => {
                self.execute_array_load()
            }
            Opcode::PopArrayInt | Opcode::PopArrayFloat | Opcode::PopArrayObject => {
                self.execute_array_store()
            }
            Opcode::PushFieldInt | Opcode::PushFieldFloat | Opcode::PushFieldObject => {
                let target = self.stack.pop()?;
                let fields = self.heap.fields(target)?;
                let value = fields[checked_index(operand as i64, fields.len())?];
                self.stack.push(value);
                Ok(())
            }
            Opcode::PopFieldInt | Opcode::PopFieldFloat | Opcode::PopFieldObject => {
                let value = self.stack.pop()?;
                let target = self.stack.pop()?;
                let fields = self.heap.fields_mut(target)?;
                let slot = checked_index(operand as i64, fields.len())?;
                fields[slot] = value;
                Ok(())
            }
            Opcode::PushMap => {
                let key = self.stack.pop()?;
                let map = self.stack.pop()?;
                let key = self.heap.map_key(key)?;
                let value = self
                    .heap
                    .map(map)?
                    .get(&key)
                    .ok_or(RuntimeError::KeyNotFound)?;
                self.stack.push(value);
                Ok(())
            }
            Opcode::PopMap => {
                let value = self.stack.pop()?;
                let key_value = self.stack.pop()?;
                let map = self.stack.pop()?;
                let key = self.heap.map_key(key_value)?;
                self.heap.map_mut(map)?.insert(key, key_value, value);
                Ok(())
            }

            Opcode::NewArrayInt => self.push_object(Object::Array(vec![Value::Int(0); operand])),
            Opcode::NewArrayFloat => {
                self.push_object(Object::Array(vec![Value::Float(0.0); operand]))
            }
            Opcode::NewArrayObject => self.push_object(Object::Array(vec![Value::Nil; operand])),
            Opcode::NewArrayLiteral => {
                let items = self.stack.pop_n(operand)?;
                self.push_object(Object::Array(items.into_vec()))
            }
            Opcode::NewStruct => {
                let fields = self.stack.pop_n(operand)?;
                self.push_object(Object::Struct(fields.into_vec()))
            }
            Opcode::NewMap => self.push_object(Object::Map(MapObject::new())),

            Opcode::BoxInterface => {
                let value = self.stack.pop()?;
                self.push_object(Object::Interface {
                    type_id: instr.operand,
                    value,
                })
            }
            Opcode::UnboxInterface => {
                let boxed = self.stack.pop()?;
                let value = match self.heap.get(boxed.as_object()?)? {
                    Object::Interface { type_id, value } if *type_id == instr.operand => *value,
                    Object::Interface { type_id, .. } => {
                        return Err(RuntimeError::TypeAssertion {
                            expected: instr.operand,
                            found: *type_id,
                        });
                    }
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "interface",
                            found: other.type_name(),
                        });
                    }
                };
                self.stack.push(value);
                Ok(())
            }
            Opcode::Length => {
                let target = self.stack.pop()?;
                let len = self.heap.length(target)?;
                self.stack.push(Value::Int(len as i64));
                Ok(())
            }
            op => Err(RuntimeError::Internal(format!(
                "execute_objects: unexpected opcode {}",
                op
            ))),
        }
    }

    fn execute_array_load(&mut self) -> Result<()> {
        let index = self.stack.pop()?.as_int()?;
        let target = self.stack.pop()?;
        let items = self.heap.array(target)?;
        let value = items[checked_index(index, items.len())?];
        self.stack.push(value);
        Ok(())
    }

    fn execute_array_store(&mut self) -> Result<()> {
        let value = self.stack.pop()?;
        let index = self.stack.pop()?.as_int()?;
        let target = self.stack.pop()?;
        let items = self.heap.array_mut(target)?;
        let slot = checked_index(index, items.len())?;
        items[slot] = value;
        Ok(())
    }

    fn push_object(&mut self, object: Object) -> Result<()> {
        let r = self.alloc(object);
        self.stack.push(Value::Object(r));
        Ok(())
    }
}
