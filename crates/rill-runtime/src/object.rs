//! Heap object variants.
//!
//! Every heap value the language exposes lives in the [`Heap`](crate::heap::Heap)
//! arena and is addressed by an [`ObjRef`] handle. The heap is non-moving, so a
//! handle stays valid for the lifetime of its object.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::Chunk;
use crate::value::Value;

/// Handle to a heap object: an index into the heap's slot arena.
///
/// Because strings are interned, two references to equal string content are
/// identical handles, which makes `ObjRef` a valid hash key for name tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u32);

/// Name-keyed table: globals, class methods, instance fields. Keys are
/// interned strings.
pub type Table = HashMap<ObjRef, Value>;

/// A host function callable from the language. The argument window is the
/// slice of the value stack holding the call's arguments.
pub type NativeFn = fn(&[Value]) -> Value;

/// An interned immutable string with its cached FNV-1a hash.
#[derive(Debug)]
pub struct ObjString {
    pub chars: Box<str>,
    pub hash: u32,
}

/// A compiled function prototype. The chunk is shared into call frames, so
/// it is reference-counted.
#[derive(Debug)]
pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Rc<Chunk>,
    /// Interned name, `None` for the top-level script.
    pub name: Option<ObjRef>,
}

#[derive(Debug)]
pub struct ObjNative {
    pub function: NativeFn,
}

/// A runtime function value binding captured upvalues to a prototype.
#[derive(Debug)]
pub struct ObjClosure {
    pub function: ObjRef,
    pub upvalues: Vec<ObjRef>,
}

/// Where a captured variable currently lives.
#[derive(Debug, Clone, Copy)]
pub enum UpvalueSlot {
    /// Still on the value stack, at this absolute slot index.
    Open(usize),
    /// Hoisted into the upvalue itself when its frame returned.
    Closed(Value),
}

/// A captured variable, threaded into the VM's open-upvalue list while open.
#[derive(Debug)]
pub struct ObjUpvalue {
    pub slot: UpvalueSlot,
    /// Next open upvalue, in order of decreasing stack slot.
    pub next: Option<ObjRef>,
}

#[derive(Debug)]
pub struct ObjClass {
    pub name: ObjRef,
    /// Method name to closure. Inheriting copies the parent's table down,
    /// so dispatch never walks a superclass chain.
    pub methods: Table,
}

#[derive(Debug)]
pub struct ObjInstance {
    pub class: ObjRef,
    pub fields: Table,
}

/// A receiver paired with a method closure, produced by property access.
#[derive(Debug)]
pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

/// The payload of one heap slot.
#[derive(Debug)]
pub enum Object {
    String(ObjString),
    Function(ObjFunction),
    Native(ObjNative),
    Closure(ObjClosure),
    Upvalue(ObjUpvalue),
    Class(ObjClass),
    Instance(ObjInstance),
    BoundMethod(ObjBoundMethod),
}

impl Object {
    /// Approximate heap footprint, charged against the collection watermark.
    pub(crate) fn heap_size(&self) -> usize {
        let owned = match self {
            Object::String(s) => s.chars.len(),
            Object::Function(f) => {
                f.chunk.code.len()
                    + f.chunk.lines.len() * std::mem::size_of::<u32>()
                    + f.chunk.constants.len() * std::mem::size_of::<Value>()
            }
            Object::Closure(c) => c.upvalues.len() * std::mem::size_of::<ObjRef>(),
            Object::Class(c) => c.methods.len() * table_entry_size(),
            Object::Instance(i) => i.fields.len() * table_entry_size(),
            Object::Native(_) | Object::Upvalue(_) | Object::BoundMethod(_) => 0,
        };
        std::mem::size_of::<Object>() + owned
    }
}

fn table_entry_size() -> usize {
    std::mem::size_of::<ObjRef>() + std::mem::size_of::<Value>()
}

/// 32-bit FNV-1a over the string's bytes; cached on every interned string.
pub(crate) fn hash_str(text: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in text.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_vectors() {
        // Published FNV-1a test vectors.
        assert_eq!(hash_str(""), 0x811c9dc5);
        assert_eq!(hash_str("a"), 0xe40c292c);
        assert_eq!(hash_str("foobar"), 0xbf9cf968);
    }

    #[test]
    fn strings_are_charged_for_their_bytes() {
        let a = Object::String(ObjString {
            chars: "x".into(),
            hash: hash_str("x"),
        });
        let b = Object::String(ObjString {
            chars: "xxxx".into(),
            hash: hash_str("xxxx"),
        });
        assert_eq!(b.heap_size() - a.heap_size(), 3);
    }
}
