//! Call frames.

use std::rc::Rc;

use crate::bytecode::Chunk;
use crate::object::ObjRef;

/// One function invocation. The chunk is the closure's function's code,
/// shared here so the dispatch loop reads it without heap lookups.
pub struct CallFrame {
    pub closure: ObjRef,
    pub chunk: Rc<Chunk>,
    /// Index of the next byte to execute within `chunk`.
    pub ip: usize,
    /// Bottom of this frame's stack window. Slot zero holds the receiver,
    /// or the callee for plain calls; arguments and locals follow.
    pub base: usize,
}
