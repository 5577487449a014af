// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Object arena and mark-sweep garbage collector.
//!
//! The heap owns every object. Everything else holds [`ObjRef`] handles.
//! Collection is stop-the-world: the caller supplies the complete root set,
//! the mark phase walks it with an explicit worklist and the sweep phase
//! frees every unmarked slot onto a free list.
//!
//! [`Heap::alloc`] never collects by itself. The engine checks
//! [`Heap::should_collect`] before allocating so that it can supply roots.

use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::object::{MapKey, MapObject, Object};
use crate::value::{ObjRef, Value};

/// Nesting depth past which [`Heap::display`] elides containers.
const DISPLAY_DEPTH: usize = 8;

/// Statistics about GC activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collections: u64,
    pub total_allocated: u64,
    pub total_freed: u64,
    pub peak_live: usize,
}

#[derive(Debug)]
struct Slot {
    object: Option<Object>,
    generation: u32,
    marked: bool,
}

/// The garbage-collected object heap.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
    threshold: usize,
    increment: usize,
    stats: GcStats,
}

impl Heap {
    /// Create a heap that first collects once `threshold` objects are live.
    pub fn new(threshold: usize, increment: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            threshold,
            increment,
            stats: GcStats::default(),
        }
    }

    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Live-object count at which the next collection triggers.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    pub fn should_collect(&self) -> bool {
        self.live >= self.threshold
    }

    /// Place an object in the arena, reusing a freed slot when one exists.
    pub fn alloc(&mut self, object: Object) -> ObjRef {
        self.stats.total_allocated += 1;
        self.live += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.live);

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            slot.marked = false;
            return ObjRef {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            object: Some(object),
            generation: 0,
            marked: false,
        });
        ObjRef {
            index,
            generation: 0,
        }
    }

    /// Check whether `r` still names a live object.
    pub fn contains(&self, r: ObjRef) -> bool {
        self.slot(r).is_some()
    }

    pub fn get(&self, r: ObjRef) -> Result<&Object> {
        self.slot(r)
            .and_then(|s| s.object.as_ref())
            .ok_or(RuntimeError::DanglingReference)
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Result<&mut Object> {
        self.slots
            .get_mut(r.index as usize)
            .filter(|s| s.generation == r.generation)
            .and_then(|s| s.object.as_mut())
            .ok_or(RuntimeError::DanglingReference)
    }

    fn slot(&self, r: ObjRef) -> Option<&Slot> {
        self.slots
            .get(r.index as usize)
            .filter(|s| s.generation == r.generation && s.object.is_some())
    }

    /// Collect garbage, keeping everything reachable from `roots`.
    /// Returns the number of objects freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjRef>) -> usize {
        let before = self.live;
        self.mark(roots);
        let freed = self.sweep();

        self.threshold = self.live + self.increment;
        self.stats.collections += 1;
        self.stats.total_freed += freed as u64;

        debug!(
            collection = self.stats.collections,
            before,
            after = self.live,
            freed,
            threshold = self.threshold,
            "gc cycle"
        );
        freed
    }

    fn mark(&mut self, roots: impl IntoIterator<Item = ObjRef>) {
        for slot in &mut self.slots {
            slot.marked = false;
        }

        let mut worklist: Vec<ObjRef> = roots.into_iter().collect();
        while let Some(r) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(r.index as usize) else {
                continue;
            };
            if slot.marked || slot.generation != r.generation {
                continue;
            }
            if let Some(object) = &slot.object {
                slot.marked = true;
                object.children(&mut worklist);
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_some() && !slot.marked {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }

    // Typed access

    pub fn alloc_string(&mut self, s: impl Into<String>) -> Value {
        Value::Object(self.alloc(Object::String(s.into())))
    }

    /// String content of a string-typed value.
    pub fn str(&self, value: Value) -> Result<&str> {
        match self.get(value.as_object()?)? {
            Object::String(s) => Ok(s),
            other => Err(RuntimeError::TypeMismatch {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    pub fn array(&self, value: Value) -> Result<&[Value]> {
        match self.get(value.as_object()?)? {
            Object::Array(items) => Ok(items),
            other => Err(RuntimeError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    pub fn array_mut(&mut self, value: Value) -> Result<&mut Vec<Value>> {
        match self.get_mut(value.as_object()?)? {
            Object::Array(items) => Ok(items),
            other => Err(RuntimeError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    pub fn fields(&self, value: Value) -> Result<&[Value]> {
        match self.get(value.as_object()?)? {
            Object::Struct(fields) => Ok(fields),
            other => Err(RuntimeError::TypeMismatch {
                expected: "struct",
                found: other.type_name(),
            }),
        }
    }

    pub fn fields_mut(&mut self, value: Value) -> Result<&mut Vec<Value>> {
        match self.get_mut(value.as_object()?)? {
            Object::Struct(fields) => Ok(fields),
            other => Err(RuntimeError::TypeMismatch {
                expected: "struct",
                found: other.type_name(),
            }),
        }
    }

    pub fn map(&self, value: Value) -> Result<&MapObject> {
        match self.get(value.as_object()?)? {
            Object::Map(map) => Ok(map),
            other => Err(RuntimeError::TypeMismatch {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    pub fn map_mut(&mut self, value: Value) -> Result<&mut MapObject> {
        match self.get_mut(value.as_object()?)? {
            Object::Map(map) => Ok(map),
            other => Err(RuntimeError::TypeMismatch {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    /// Structural key for a map lookup.
    pub fn map_key(&self, value: Value) -> Result<MapKey> {
        Ok(match value {
            Value::Int(n) => MapKey::Int(n),
            Value::Float(x) => MapKey::Float(x.to_bits()),
            Value::Nil => MapKey::Nil,
            Value::Object(r) => match self.get(r)? {
                Object::String(s) => MapKey::Str(s.clone()),
                _ => MapKey::Ref(r),
            },
        })
    }

    /// Length of a string (in bytes), array or map.
    pub fn length(&self, value: Value) -> Result<usize> {
        match self.get(value.as_object()?)? {
            Object::String(s) => Ok(s.len()),
            Object::Array(items) => Ok(items.len()),
            Object::Map(map) => Ok(map.len()),
            other => Err(RuntimeError::TypeMismatch {
                expected: "string, array or map",
                found: other.type_name(),
            }),
        }
    }

    /// Render a value for printing.
    pub fn display(&self, value: Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value, 0);
        out
    }

    fn write_value(&self, out: &mut String, value: Value, depth: usize) {
        let r = match value {
            Value::Int(n) => return out.push_str(&n.to_string()),
            Value::Float(x) => return out.push_str(&format_float(x)),
            Value::Nil => return out.push_str("nil"),
            Value::Object(r) => r,
        };
        let Ok(object) = self.get(r) else {
            return out.push_str("<dangling>");
        };
        if depth >= DISPLAY_DEPTH && !matches!(object, Object::String(_)) {
            return out.push_str("...");
        }
        match object {
            Object::String(s) => out.push_str(s),
            Object::Array(items) => self.write_seq(out, "[", items, "]", depth),
            Object::Struct(fields) => self.write_seq(out, "{", fields, "}", depth),
            Object::Map(map) => {
                out.push_str("map[");
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.write_value(out, k, depth + 1);
                    out.push(':');
                    self.write_value(out, v, depth + 1);
                }
                out.push(']');
            }
            Object::Interface { value, .. } => self.write_value(out, *value, depth + 1),
            Object::CallInfo(_) => out.push_str("<call-info>"),
        }
    }

    fn write_seq(&self, out: &mut String, open: &str, items: &[Value], close: &str, depth: usize) {
        out.push_str(open);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_value(out, *item, depth + 1);
        }
        out.push_str(close);
    }
}

/// Float formatting shared by printing and `CAST_FLOAT_TO_STRING`.
/// Integral floats keep a trailing `.0`.
pub fn format_float(x: f64) -> String {
    format!("{:?}", x)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ROOTS: [ObjRef; 0] = [];

    #[test]
    fn test_alloc_reuses_freed_slots() {
        let mut heap = Heap::new(16, 16);
        let a = heap.alloc(Object::String("a".into()));
        heap.collect(NO_ROOTS);
        assert!(!heap.contains(a));

        let b = heap.alloc(Object::String("b".into()));
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(heap.get(a).unwrap_err(), RuntimeError::DanglingReference);
        assert_eq!(heap.str(Value::Object(b)).unwrap(), "b");
    }

    #[test]
    fn test_collect_keeps_reachable() {
        let mut heap = Heap::new(16, 16);
        let inner = heap.alloc(Object::String("inner".into()));
        let outer = heap.alloc(Object::Array(vec![Value::Object(inner), Value::Int(1)]));
        let garbage = heap.alloc(Object::Struct(vec![Value::Nil]));

        let freed = heap.collect([outer]);
        assert_eq!(freed, 1);
        assert!(heap.contains(outer));
        assert!(heap.contains(inner));
        assert!(!heap.contains(garbage));
        assert_eq!(heap.live_objects(), 2);
    }

    #[test]
    fn test_collect_handles_cycles() {
        let mut heap = Heap::new(16, 16);
        let a = heap.alloc(Object::Array(vec![Value::Nil]));
        let b = heap.alloc(Object::Struct(vec![Value::Object(a)]));
        heap.array_mut(Value::Object(a)).unwrap()[0] = Value::Object(b);
        let self_ref = heap.alloc(Object::Array(vec![Value::Nil]));
        heap.array_mut(Value::Object(self_ref)).unwrap()[0] = Value::Object(self_ref);

        assert_eq!(heap.collect([a]), 1);
        assert!(heap.contains(a) && heap.contains(b));

        assert_eq!(heap.collect(NO_ROOTS), 2);
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_should_collect_threshold() {
        let mut heap = Heap::new(2, 3);
        heap.alloc(Object::String(String::new()));
        assert!(!heap.should_collect());
        let kept = heap.alloc(Object::String(String::new()));
        assert!(heap.should_collect());

        heap.collect([kept]);
        assert_eq!(heap.threshold(), 4);
        assert!(!heap.should_collect());
        assert_eq!(heap.stats().collections, 1);
        assert_eq!(heap.stats().total_freed, 1);
        assert_eq!(heap.stats().peak_live, 2);
    }

    #[test]
    fn test_map_keys_are_structural() {
        let mut heap = Heap::new(16, 16);
        let a = heap.alloc_string("k");
        let b = heap.alloc_string("k");
        assert_eq!(heap.map_key(a).unwrap(), heap.map_key(b).unwrap());

        let arr = heap.alloc(Object::Array(Vec::new()));
        assert_eq!(heap.map_key(Value::Object(arr)).unwrap(), MapKey::Ref(arr));
        assert_ne!(
            heap.map_key(Value::Float(0.0)).unwrap(),
            heap.map_key(Value::Float(-0.0)).unwrap()
        );
    }

    #[test]
    fn test_display_elides_deep_cycles() {
        let mut heap = Heap::new(16, 16);
        let s = heap.alloc_string("x");
        let arr = heap.alloc(Object::Array(vec![Value::Int(1), s, Value::Float(2.0)]));
        assert_eq!(heap.display(Value::Object(arr)), "[1, x, 2.0]");

        heap.array_mut(Value::Object(arr)).unwrap()[0] = Value::Object(arr);
        let text = heap.display(Value::Object(arr));
        assert!(text.contains("..."));
    }
}
