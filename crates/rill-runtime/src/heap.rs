//! Object heap: allocation, string interning, and the mark-sweep collector.
//!
//! Objects live in a slot arena addressed by [`ObjRef`] indices; freed slots
//! go on a free list and are reused. The arena's occupied slots are the
//! all-objects list the sweep walks. The heap never collects on its own —
//! the owner of the roots (the VM, or the compiler mid-compile) checks
//! [`Heap::needs_collection`] before an allocation, marks its roots, and
//! drives the trace / weak-sweep / sweep sequence.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::Chunk;
use crate::object::{hash_str, ObjRef, Object, ObjString, Table, UpvalueSlot};
use crate::value::Value;

/// Heap growth factor: after a collection the next trigger point is set to
/// this multiple of the surviving bytes.
const GC_HEAP_GROW_FACTOR: usize = 2;

/// First collection triggers once this many bytes are live.
const GC_FIRST_THRESHOLD: usize = 1024 * 1024;

struct Slot {
    marked: bool,
    /// Size charged at allocation, refunded at sweep.
    size: usize,
    object: Option<Object>,
}

/// Roots owned by the caller that must survive a collection triggered while
/// the compiler (not the VM) holds the heap.
pub struct ExternalRoots<'a> {
    pub globals: &'a Table,
    pub init_string: Option<ObjRef>,
}

impl ExternalRoots<'_> {
    pub fn mark(&self, heap: &mut Heap) {
        for (&name, &value) in self.globals {
            heap.mark_object(name);
            heap.mark_value(value);
        }
        if let Some(init) = self.init_string {
            heap.mark_object(init);
        }
    }
}

pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Weak intern set: cached FNV-1a hash to the strings carrying it.
    /// Entries for unmarked strings are dropped between mark and sweep.
    strings: HashMap<u32, Vec<ObjRef>>,
    /// Gray worklist. Plain host memory, never itself collected.
    gray: Vec<ObjRef>,
    bytes_allocated: usize,
    next_gc: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            strings: HashMap::new(),
            gray: Vec::new(),
            bytes_allocated: 0,
            next_gc: GC_FIRST_THRESHOLD,
        }
    }

    /// Store an object, reusing a free slot when one exists.
    ///
    /// Never triggers a collection; callers check [`Heap::needs_collection`]
    /// first, while every reference the new object carries is still rooted.
    pub fn alloc(&mut self, object: Object) -> ObjRef {
        let size = object.heap_size();
        self.bytes_allocated += size;
        let slot = Slot {
            marked: false,
            size,
            object: Some(object),
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                ObjRef(index)
            }
            None => {
                self.slots.push(slot);
                ObjRef((self.slots.len() - 1) as u32)
            }
        }
    }

    /// True when the next allocation should be preceded by a collection.
    pub fn needs_collection(&self) -> bool {
        if cfg!(feature = "gc-stress") {
            return true;
        }
        self.bytes_allocated > self.next_gc
    }

    /// Return the canonical string for this content, allocating only when no
    /// equal string is live.
    pub fn intern(&mut self, text: &str) -> ObjRef {
        let hash = hash_str(text);
        if let Some(bucket) = self.strings.get(&hash) {
            for &existing in bucket {
                if &*self.string(existing).chars == text {
                    return existing;
                }
            }
        }
        let reference = self.alloc(Object::String(ObjString {
            chars: text.into(),
            hash,
        }));
        self.strings.entry(hash).or_default().push(reference);
        reference
    }

    // === Accessors ===
    //
    // Handle/kind mismatches are compiler bugs, not user errors; the
    // accessors treat them as such.

    pub fn get(&self, reference: ObjRef) -> &Object {
        self.slots[reference.0 as usize]
            .object
            .as_ref()
            .expect("use of freed object")
    }

    pub fn get_mut(&mut self, reference: ObjRef) -> &mut Object {
        self.slots[reference.0 as usize]
            .object
            .as_mut()
            .expect("use of freed object")
    }

    pub fn string(&self, reference: ObjRef) -> &ObjString {
        match self.get(reference) {
            Object::String(s) => s,
            _ => panic!("object is not a string"),
        }
    }

    pub fn function(&self, reference: ObjRef) -> &crate::object::ObjFunction {
        match self.get(reference) {
            Object::Function(f) => f,
            _ => panic!("object is not a function"),
        }
    }

    pub fn closure(&self, reference: ObjRef) -> &crate::object::ObjClosure {
        match self.get(reference) {
            Object::Closure(c) => c,
            _ => panic!("object is not a closure"),
        }
    }

    pub fn closure_mut(&mut self, reference: ObjRef) -> &mut crate::object::ObjClosure {
        match self.get_mut(reference) {
            Object::Closure(c) => c,
            _ => panic!("object is not a closure"),
        }
    }

    pub fn upvalue(&self, reference: ObjRef) -> &crate::object::ObjUpvalue {
        match self.get(reference) {
            Object::Upvalue(u) => u,
            _ => panic!("object is not an upvalue"),
        }
    }

    pub fn upvalue_mut(&mut self, reference: ObjRef) -> &mut crate::object::ObjUpvalue {
        match self.get_mut(reference) {
            Object::Upvalue(u) => u,
            _ => panic!("object is not an upvalue"),
        }
    }

    pub fn class(&self, reference: ObjRef) -> &crate::object::ObjClass {
        match self.get(reference) {
            Object::Class(c) => c,
            _ => panic!("object is not a class"),
        }
    }

    pub fn class_mut(&mut self, reference: ObjRef) -> &mut crate::object::ObjClass {
        match self.get_mut(reference) {
            Object::Class(c) => c,
            _ => panic!("object is not a class"),
        }
    }

    pub fn instance(&self, reference: ObjRef) -> &crate::object::ObjInstance {
        match self.get(reference) {
            Object::Instance(i) => i,
            _ => panic!("object is not an instance"),
        }
    }

    pub fn instance_mut(&mut self, reference: ObjRef) -> &mut crate::object::ObjInstance {
        match self.get_mut(reference) {
            Object::Instance(i) => i,
            _ => panic!("object is not an instance"),
        }
    }

    // === Collection ===

    /// Mark one object gray. No-op when already marked or freed.
    pub fn mark_object(&mut self, reference: ObjRef) {
        let slot = &mut self.slots[reference.0 as usize];
        if slot.object.is_none() || slot.marked {
            return;
        }
        slot.marked = true;
        self.gray.push(reference);
    }

    /// Mark a value's object, if it has one.
    pub fn mark_value(&mut self, value: Value) {
        if value.is_object() {
            self.mark_object(value.as_object());
        }
    }

    /// Drain the gray worklist, blackening each object by marking its
    /// outgoing references.
    pub fn trace_references(&mut self) {
        while let Some(reference) = self.gray.pop() {
            self.blacken(reference);
        }
    }

    fn blacken(&mut self, reference: ObjRef) {
        // Collect the outgoing references first; marking mutates the heap.
        let mut children: Vec<Value> = Vec::new();
        let mut chunk: Option<Rc<Chunk>> = None;
        match self.get(reference) {
            Object::String(_) | Object::Native(_) => {}
            Object::Upvalue(upvalue) => {
                // Open upvalues point into the stack, which is a root itself.
                if let UpvalueSlot::Closed(value) = upvalue.slot {
                    children.push(value);
                }
            }
            Object::Function(function) => {
                if let Some(name) = function.name {
                    children.push(Value::object(name));
                }
                chunk = Some(Rc::clone(&function.chunk));
            }
            Object::Closure(closure) => {
                children.push(Value::object(closure.function));
                children.extend(closure.upvalues.iter().map(|&u| Value::object(u)));
            }
            Object::Class(class) => {
                children.push(Value::object(class.name));
                for (&name, &method) in &class.methods {
                    children.push(Value::object(name));
                    children.push(method);
                }
            }
            Object::Instance(instance) => {
                children.push(Value::object(instance.class));
                for (&name, &value) in &instance.fields {
                    children.push(Value::object(name));
                    children.push(value);
                }
            }
            Object::BoundMethod(bound) => {
                children.push(bound.receiver);
                children.push(Value::object(bound.method));
            }
        }
        for value in children {
            self.mark_value(value);
        }
        if let Some(chunk) = chunk {
            for &constant in &chunk.constants {
                self.mark_value(constant);
            }
        }
    }

    /// Drop intern entries whose string did not survive marking. Must run
    /// after the trace and before the sweep, or freed strings would leave
    /// dangling intern entries behind.
    pub fn remove_unmarked_strings(&mut self) {
        let slots = &self.slots;
        self.strings.retain(|_, bucket| {
            bucket.retain(|r| slots[r.0 as usize].marked);
            !bucket.is_empty()
        });
    }

    /// Free every unmarked object and clear the mark bits of the survivors.
    pub fn sweep(&mut self) {
        let mut bytes_freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                bytes_freed += slot.size;
                slot.object = None;
                self.free.push(index as u32);
            }
        }
        self.bytes_allocated -= bytes_freed;
        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;
    }

    // === Introspection ===

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of distinct interned strings.
    pub fn string_count(&self) -> usize {
        self.strings.values().map(Vec::len).sum()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// External representation of a value, as `print` emits it.
    pub fn show(&self, value: Value) -> String {
        if value.is_nil() {
            return "nil".to_string();
        }
        if value.is_bool() {
            return value.as_bool().to_string();
        }
        if value.is_number() {
            return value.as_number().to_string();
        }
        match self.get(value.as_object()) {
            Object::String(s) => s.chars.to_string(),
            Object::Function(f) => self.show_function(f.name),
            Object::Native(_) => "<native fn>".to_string(),
            Object::Closure(c) => self.show_function(self.function(c.function).name),
            Object::Upvalue(_) => "upvalue".to_string(),
            Object::Class(c) => self.string(c.name).chars.to_string(),
            Object::Instance(i) => {
                format!("{} instance", self.string(self.class(i.class).name).chars)
            }
            Object::BoundMethod(b) => {
                self.show_function(self.function(self.closure(b.method).function).name)
            }
        }
    }

    fn show_function(&self, name: Option<ObjRef>) -> String {
        match name {
            Some(name) => format!("<fn {}>", self.string(name).chars),
            None => "<script>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjClosure, ObjFunction};

    #[test]
    fn interning_returns_identical_handles_for_equal_content() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        let c = heap.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.string_count(), 2);
    }

    #[test]
    fn unrooted_objects_are_swept() {
        let mut heap = Heap::new();
        let keep = heap.intern("keep");
        heap.intern("drop");
        assert_eq!(heap.object_count(), 2);

        heap.mark_object(keep);
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();

        assert_eq!(heap.object_count(), 1);
        assert_eq!(heap.string_count(), 1);
        assert_eq!(&*heap.string(keep).chars, "keep");
    }

    #[test]
    fn weak_intern_entries_do_not_keep_strings_alive() {
        let mut heap = Heap::new();
        heap.intern("transient");
        // Nothing marked: the intern entry alone must not retain the string.
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();
        assert_eq!(heap.string_count(), 0);
        // The content can be interned again afterwards.
        let again = heap.intern("transient");
        assert_eq!(&*heap.string(again).chars, "transient");
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut heap = Heap::new();
        let dropped = heap.intern("gone");
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();
        let replacement = heap.intern("new");
        assert_eq!(dropped.0, replacement.0);
    }

    #[test]
    fn tracing_reaches_closure_function_and_name() {
        let mut heap = Heap::new();
        let name = heap.intern("f");
        let function = heap.alloc(Object::Function(ObjFunction {
            arity: 0,
            upvalue_count: 0,
            chunk: Rc::new(Chunk::new()),
            name: Some(name),
        }));
        let closure = heap.alloc(Object::Closure(ObjClosure {
            function,
            upvalues: Vec::new(),
        }));

        heap.mark_object(closure);
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();

        assert_eq!(heap.object_count(), 3);
        assert_eq!(&*heap.string(name).chars, "f");
    }

    #[test]
    fn second_collection_frees_nothing_new() {
        let mut heap = Heap::new();
        let root = heap.intern("root");
        heap.intern("garbage");

        heap.mark_object(root);
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();
        let after_first = heap.object_count();

        heap.mark_object(root);
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();
        assert_eq!(heap.object_count(), after_first);
    }

    #[test]
    fn sweep_refunds_bytes_and_resets_the_watermark() {
        let mut heap = Heap::new();
        heap.intern("abcdef");
        let live = heap.bytes_allocated();
        assert!(live > 0);
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();
        assert_eq!(heap.bytes_allocated(), 0);
        assert_eq!(heap.next_gc, 0);
    }
}
