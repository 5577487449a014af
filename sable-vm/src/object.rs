// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Heap objects.

use std::collections::HashMap;

use crate::statics::FunctionId;
use crate::value::{ObjRef, Value};

/// Identity of the code that performed a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// A host call through `Vm::invoke`.
    Host,
    /// Top-level code of the linked unit with this index.
    TopLevel(usize),
    Function(FunctionId),
}

/// Saved caller state, written into the frame by a call and consumed by its return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInfo {
    pub caller: Caller,
    /// Offset of the INVOKE instruction in the caller's code.
    pub return_pc: usize,
    pub saved_base: usize,
}

/// Structural map key.
///
/// Strings hash by content and floats by bit pattern. Every other object
/// hashes by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Float(u64),
    Nil,
    Str(String),
    Ref(ObjRef),
}

/// A map object. Entries keep the original key value so key objects stay reachable.
#[derive(Debug, Clone, Default)]
pub struct MapObject {
    entries: HashMap<MapKey, (Value, Value)>,
}

impl MapObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        self.entries.get(key).map(|(_, v)| *v)
    }

    /// Insert or overwrite; the last write for a key wins.
    pub fn insert(&mut self, key: MapKey, key_value: Value, value: Value) {
        self.entries.insert(key, (key_value, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.entries.values().copied()
    }
}

/// A heap-allocated object.
#[derive(Debug, Clone)]
pub enum Object {
    String(String),
    /// Fixed length, mutable in place.
    Array(Vec<Value>),
    Map(MapObject),
    /// Fields addressed by index.
    Struct(Vec<Value>),
    /// A value boxed with its dynamic type identifier.
    Interface { type_id: u16, value: Value },
    CallInfo(CallInfo),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::String(_) => "string",
            Object::Array(_) => "array",
            Object::Map(_) => "map",
            Object::Struct(_) => "struct",
            Object::Interface { .. } => "interface",
            Object::CallInfo(_) => "call info",
        }
    }

    /// Push every object this one references onto `out`.
    pub fn children(&self, out: &mut Vec<ObjRef>) {
        match self {
            Object::Array(items) | Object::Struct(items) => {
                out.extend(items.iter().filter_map(Value::obj_ref));
            }
            Object::Map(map) => {
                for (k, v) in map.iter() {
                    out.extend(k.obj_ref());
                    out.extend(v.obj_ref());
                }
            }
            Object::Interface { value, .. } => out.extend(value.obj_ref()),
            Object::String(_) | Object::CallInfo(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(index: u32) -> ObjRef {
        ObjRef {
            index,
            generation: 0,
        }
    }

    #[test]
    fn test_map_last_write_wins() {
        let mut map = MapObject::new();
        map.insert(MapKey::Int(1), Value::Int(1), Value::Int(10));
        map.insert(MapKey::Int(1), Value::Int(1), Value::Int(20));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&MapKey::Int(1)), Some(Value::Int(20)));
        assert_eq!(map.get(&MapKey::Nil), None);
    }

    #[test]
    fn test_children_cover_keys_and_values() {
        let mut map = MapObject::new();
        map.insert(MapKey::Ref(obj(1)), Value::Object(obj(1)), Value::Object(obj(2)));
        map.insert(MapKey::Int(0), Value::Int(0), Value::Float(1.0));

        let mut out = Vec::new();
        Object::Map(map).children(&mut out);
        out.sort_by_key(|r| r.index);
        assert_eq!(out, vec![obj(1), obj(2)]);

        let mut out = Vec::new();
        Object::Array(vec![Value::Nil, Value::Object(obj(3)), Value::Int(4)]).children(&mut out);
        assert_eq!(out, vec![obj(3)]);
    }
}
