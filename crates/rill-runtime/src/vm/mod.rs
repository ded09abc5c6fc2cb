//! Stack-based virtual machine.
//!
//! Executes bytecode through a central dispatch loop over a value stack and
//! a call-frame stack. The VM owns the heap; every allocation site is a
//! collection safepoint, so the stack, frames, globals, open upvalues and
//! the `init` symbol must root everything live whenever `alloc` runs.

mod frame;

pub use frame::CallFrame;

use std::io::{self, Write};
use std::rc::Rc;

use thiserror::Error;

use crate::bytecode::Opcode;
use crate::compiler::compile;
use crate::diagnostic::Diagnostic;
use crate::heap::{ExternalRoots, Heap};
use crate::object::{
    NativeFn, ObjBoundMethod, ObjClass, ObjClosure, ObjInstance, ObjNative, ObjRef, ObjUpvalue,
    Object, Table, UpvalueSlot,
};
use crate::value::Value;

/// Maximum call depth; the 65th frame raises "Stack overflow.".
const FRAMES_MAX: usize = 64;
/// Value stack slots reserved up front.
const STACK_MAX: usize = FRAMES_MAX * 256;

/// Where `print` output and error reports go. Injectable so embedders and
/// tests can capture both.
pub type OutputWriter = Box<dyn Write>;

/// An error raised while executing bytecode. The rendered message matches
/// what the VM prints before its stack trace.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("Only instances have properties.")]
    PropertyOnNonInstance,
    #[error("Only instances have fields.")]
    FieldOnNonInstance,
    #[error("Only instances have methods.")]
    MethodOnNonInstance,
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: u8, got: u8 },
    #[error("Superclass must be a class.")]
    SuperclassNotClass,
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Unknown opcode {0}.")]
    UnknownOpcode(u8),
}

/// Outcome of [`Vm::interpret`]: compile diagnostics or a runtime error.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("compile error")]
    Compile(Vec<Diagnostic>),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    /// Head of the open-upvalue list, sorted by decreasing stack slot.
    open_upvalues: Option<ObjRef>,
    heap: Heap,
    /// The interned `"init"` symbol; initializer lookup never re-hashes.
    init_string: ObjRef,
    stdout: OutputWriter,
    stderr: OutputWriter,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern("init");
        let mut vm = Self {
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            open_upvalues: None,
            heap,
            init_string,
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        };
        vm.define_native("clock", clock_native);
        vm
    }

    /// Redirect `print` output.
    pub fn set_output(&mut self, writer: OutputWriter) {
        self.stdout = writer;
    }

    /// Redirect runtime error reports and stack traces.
    pub fn set_error_output(&mut self, writer: OutputWriter) {
        self.stderr = writer;
    }

    /// Read-only view of the heap, for embedders and tests.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Compile and execute a source string. Globals persist across calls,
    /// which is what keeps a REPL session alive.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let function = {
            let roots = ExternalRoots {
                globals: &self.globals,
                init_string: Some(self.init_string),
            };
            compile(source, &mut self.heap, roots).map_err(InterpretError::Compile)?
        };

        // Keep the bare function rooted while its closure is allocated.
        self.push(Value::object(function));
        let closure = self.alloc(Object::Closure(ObjClosure {
            function,
            upvalues: Vec::new(),
        }));
        self.pop();
        self.push(Value::object(closure));

        self.call_closure(closure, 0)
            .and_then(|()| self.run())
            .map_err(|error| {
                self.report_runtime_error(&error);
                InterpretError::Runtime(error)
            })
    }

    // === Stack ===

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
    }

    // === Instruction stream ===

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active call frame")
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("no active call frame");
        let byte = frame.chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.frames.last_mut().expect("no active call frame");
        let hi = frame.chunk.code[frame.ip] as u16;
        let lo = frame.chunk.code[frame.ip + 1] as u16;
        frame.ip += 2;
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        self.frame().chunk.constants[index]
    }

    /// Read a constant that the compiler guarantees is an interned string.
    fn read_string(&mut self) -> ObjRef {
        self.read_constant().as_object()
    }

    // === Heap interaction ===

    /// Allocate through the collection safepoint. Every reference the new
    /// object carries must already be rooted when this is called.
    fn alloc(&mut self, object: Object) -> ObjRef {
        if self.heap.needs_collection() {
            self.collect_garbage();
        }
        self.heap.alloc(object)
    }

    fn intern_string(&mut self, text: &str) -> ObjRef {
        if self.heap.needs_collection() {
            self.collect_garbage();
        }
        self.heap.intern(text)
    }

    /// Force a full mark-sweep collection.
    pub fn collect_garbage(&mut self) {
        for value in &self.stack {
            self.heap.mark_value(*value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure);
        }
        let mut upvalue = self.open_upvalues;
        while let Some(reference) = upvalue {
            self.heap.mark_object(reference);
            upvalue = self.heap.upvalue(reference).next;
        }
        for (&name, &value) in &self.globals {
            self.heap.mark_object(name);
            self.heap.mark_value(value);
        }
        self.heap.mark_object(self.init_string);

        self.heap.trace_references();
        self.heap.remove_unmarked_strings();
        self.heap.sweep();
    }

    fn define_native(&mut self, name: &str, function: NativeFn) {
        let name = self.intern_string(name);
        // Both the name and the native stay rooted on the stack while the
        // other is allocated.
        self.push(Value::object(name));
        let native = self.alloc(Object::Native(ObjNative { function }));
        self.push(Value::object(native));
        self.globals.insert(name, Value::object(native));
        self.pop();
        self.pop();
    }

    // === Dispatch ===

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            #[cfg(feature = "trace-execution")]
            {
                let mut shown = String::from("          ");
                for value in &self.stack {
                    shown.push_str(&format!("[ {} ]", self.heap.show(*value)));
                }
                eprintln!("{shown}");
                let frame = self.frame();
                let (text, _) =
                    crate::bytecode::disassemble_instruction(&self.heap, &frame.chunk, frame.ip);
                eprint!("{text}");
            }

            let opcode = Opcode::try_from(self.read_byte())
                .map_err(|error| RuntimeError::UnknownOpcode(error.number))?;

            match opcode {
                // ===== Constants and literals =====
                Opcode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                Opcode::Nil => self.push(Value::nil()),
                Opcode::True => self.push(Value::boolean(true)),
                Opcode::False => self.push(Value::boolean(false)),
                Opcode::Pop => {
                    self.pop();
                }

                // ===== Variables =====
                Opcode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    self.push(self.stack[base + slot]);
                }
                Opcode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    // Assignment is an expression; the value stays put.
                    self.stack[base + slot] = self.peek(0);
                }
                Opcode::GetGlobal => {
                    let name = self.read_string();
                    let value = self.globals.get(&name).copied();
                    match value {
                        Some(value) => self.push(value),
                        None => return Err(self.undefined_variable(name)),
                    }
                }
                Opcode::DefineGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    self.globals.insert(name, value);
                    self.pop();
                }
                Opcode::SetGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    // Assignment never creates a global.
                    if self.globals.insert(name, value).is_none() {
                        self.globals.remove(&name);
                        return Err(self.undefined_variable(name));
                    }
                }
                Opcode::GetUpvalue => {
                    let index = self.read_byte() as usize;
                    let upvalue = self.heap.closure(self.frame().closure).upvalues[index];
                    let value = match self.heap.upvalue(upvalue).slot {
                        UpvalueSlot::Open(slot) => self.stack[slot],
                        UpvalueSlot::Closed(value) => value,
                    };
                    self.push(value);
                }
                Opcode::SetUpvalue => {
                    let index = self.read_byte() as usize;
                    let upvalue = self.heap.closure(self.frame().closure).upvalues[index];
                    let value = self.peek(0);
                    match self.heap.upvalue(upvalue).slot {
                        UpvalueSlot::Open(slot) => self.stack[slot] = value,
                        UpvalueSlot::Closed(_) => {
                            self.heap.upvalue_mut(upvalue).slot = UpvalueSlot::Closed(value);
                        }
                    }
                }

                // ===== Properties =====
                Opcode::GetProperty => {
                    let name = self.read_string();
                    let receiver = self.peek(0);
                    if !receiver.is_object() {
                        return Err(RuntimeError::PropertyOnNonInstance);
                    }
                    let (class, field) = match self.heap.get(receiver.as_object()) {
                        Object::Instance(instance) => {
                            (instance.class, instance.fields.get(&name).copied())
                        }
                        _ => return Err(RuntimeError::PropertyOnNonInstance),
                    };
                    match field {
                        // Fields shadow methods.
                        Some(value) => {
                            self.pop();
                            self.push(value);
                        }
                        None => self.bind_method(class, name)?,
                    }
                }
                Opcode::SetProperty => {
                    let name = self.read_string();
                    let target = self.peek(1);
                    if !self.is_instance(target) {
                        return Err(RuntimeError::FieldOnNonInstance);
                    }
                    let value = self.peek(0);
                    self.heap
                        .instance_mut(target.as_object())
                        .fields
                        .insert(name, value);
                    let value = self.pop();
                    self.pop();
                    self.push(value);
                }
                Opcode::GetSuper => {
                    let name = self.read_string();
                    let superclass = self.pop().as_object();
                    self.bind_method(superclass, name)?;
                }

                // ===== Operators =====
                Opcode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::boolean(a == b));
                }
                Opcode::Greater => self.binary_number_op(|a, b| Value::boolean(a > b))?,
                Opcode::Less => self.binary_number_op(|a, b| Value::boolean(a < b))?,
                Opcode::Add => {
                    let b = self.peek(0);
                    let a = self.peek(1);
                    if self.is_string(a) && self.is_string(b) {
                        self.concatenate();
                    } else if a.is_number() && b.is_number() {
                        let b = self.pop().as_number();
                        let a = self.pop().as_number();
                        self.push(Value::number(a + b));
                    } else {
                        return Err(RuntimeError::OperandsMustBeNumbersOrStrings);
                    }
                }
                Opcode::Subtract => self.binary_number_op(|a, b| Value::number(a - b))?,
                Opcode::Multiply => self.binary_number_op(|a, b| Value::number(a * b))?,
                Opcode::Divide => self.binary_number_op(|a, b| Value::number(a / b))?,
                Opcode::Not => {
                    let value = self.pop();
                    self.push(Value::boolean(value.is_falsey()));
                }
                Opcode::Negate => {
                    if !self.peek(0).is_number() {
                        return Err(RuntimeError::OperandMustBeNumber);
                    }
                    let value = self.pop().as_number();
                    self.push(Value::number(-value));
                }

                // ===== Output =====
                Opcode::Print => {
                    let value = self.pop();
                    let shown = self.heap.show(value);
                    let _ = writeln!(self.stdout, "{shown}");
                }

                // ===== Control flow =====
                Opcode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().expect("no active call frame").ip += offset;
                }
                Opcode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    // Peeks: the logical operators need the operand kept.
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().expect("no active call frame").ip += offset;
                    }
                }
                Opcode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().expect("no active call frame").ip -= offset;
                }

                // ===== Calls and closures =====
                Opcode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                Opcode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    self.invoke(name, arg_count)?;
                }
                Opcode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    let superclass = self.pop().as_object();
                    self.invoke_from_class(superclass, name, arg_count)?;
                }
                Opcode::Closure => {
                    let function = self.read_constant().as_object();
                    let upvalue_count = self.heap.function(function).upvalue_count;
                    let closure = self.alloc(Object::Closure(ObjClosure {
                        function,
                        upvalues: Vec::with_capacity(upvalue_count),
                    }));
                    // On the stack before the captures below can collect.
                    self.push(Value::object(closure));
                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte() == 1;
                        let index = self.read_byte() as usize;
                        let captured = if is_local {
                            let base = self.frame().base;
                            self.capture_upvalue(base + index)
                        } else {
                            self.heap.closure(self.frame().closure).upvalues[index]
                        };
                        self.heap.closure_mut(closure).upvalues.push(captured);
                    }
                }
                Opcode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                Opcode::Return => {
                    let result = self.pop();
                    let base = self.frame().base;
                    // The returning frame's captured locals move to the heap.
                    self.close_upvalues(base);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        // Pop the script closure; execution is complete.
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(base);
                    self.push(result);
                }

                // ===== Classes =====
                Opcode::Class => {
                    let name = self.read_string();
                    let class = self.alloc(Object::Class(ObjClass {
                        name,
                        methods: Table::new(),
                    }));
                    self.push(Value::object(class));
                }
                Opcode::Inherit => {
                    let superclass = self.peek(1);
                    if !self.is_class(superclass) {
                        return Err(RuntimeError::SuperclassNotClass);
                    }
                    // Copy-down inheritance: dispatch never walks a chain.
                    let methods = self.heap.class(superclass.as_object()).methods.clone();
                    let subclass = self.peek(0).as_object();
                    self.heap.class_mut(subclass).methods.extend(methods);
                    self.pop();
                }
                Opcode::Method => {
                    let name = self.read_string();
                    let method = self.peek(0);
                    let class = self.peek(1).as_object();
                    self.heap.class_mut(class).methods.insert(name, method);
                    self.pop();
                }
            }
        }
    }

    // === Value classification ===

    fn is_string(&self, value: Value) -> bool {
        value.is_object() && matches!(self.heap.get(value.as_object()), Object::String(_))
    }

    fn is_class(&self, value: Value) -> bool {
        value.is_object() && matches!(self.heap.get(value.as_object()), Object::Class(_))
    }

    fn is_instance(&self, value: Value) -> bool {
        value.is_object() && matches!(self.heap.get(value.as_object()), Object::Instance(_))
    }

    fn undefined_variable(&self, name: ObjRef) -> RuntimeError {
        RuntimeError::UndefinedVariable(self.heap.string(name).chars.to_string())
    }

    // === Operators ===

    fn binary_number_op(
        &mut self,
        op: impl FnOnce(f64, f64) -> Value,
    ) -> Result<(), RuntimeError> {
        if !self.peek(0).is_number() || !self.peek(1).is_number() {
            return Err(RuntimeError::OperandsMustBeNumbers);
        }
        let b = self.pop().as_number();
        let a = self.pop().as_number();
        self.push(op(a, b));
        Ok(())
    }

    /// Concatenate the two strings on top of the stack. The operands stay
    /// on the stack across the allocation so a collection cannot free them.
    fn concatenate(&mut self) {
        let b = self.peek(0).as_object();
        let a = self.peek(1).as_object();
        let mut text = String::with_capacity(
            self.heap.string(a).chars.len() + self.heap.string(b).chars.len(),
        );
        text.push_str(&self.heap.string(a).chars);
        text.push_str(&self.heap.string(b).chars);
        let result = self.intern_string(&text);
        self.pop();
        self.pop();
        self.push(Value::object(result));
    }

    // === Calls ===

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        enum Callee {
            Closure,
            Bound(Value, ObjRef),
            Class,
            Native(NativeFn),
        }

        if callee.is_object() {
            let reference = callee.as_object();
            let kind = match self.heap.get(reference) {
                Object::Closure(_) => Some(Callee::Closure),
                Object::BoundMethod(bound) => Some(Callee::Bound(bound.receiver, bound.method)),
                Object::Class(_) => Some(Callee::Class),
                Object::Native(native) => Some(Callee::Native(native.function)),
                _ => None,
            };
            match kind {
                Some(Callee::Closure) => return self.call_closure(reference, arg_count),
                Some(Callee::Bound(receiver, method)) => {
                    // The receiver takes slot zero of the new frame.
                    let slot = self.stack.len() - arg_count as usize - 1;
                    self.stack[slot] = receiver;
                    return self.call_closure(method, arg_count);
                }
                Some(Callee::Class) => {
                    let slot = self.stack.len() - arg_count as usize - 1;
                    let instance = self.alloc(Object::Instance(ObjInstance {
                        class: reference,
                        fields: Table::new(),
                    }));
                    self.stack[slot] = Value::object(instance);
                    let initializer = self
                        .heap
                        .class(reference)
                        .methods
                        .get(&self.init_string)
                        .copied();
                    return match initializer {
                        Some(initializer) => {
                            self.call_closure(initializer.as_object(), arg_count)
                        }
                        None if arg_count != 0 => Err(RuntimeError::ArityMismatch {
                            expected: 0,
                            got: arg_count,
                        }),
                        None => Ok(()),
                    };
                }
                Some(Callee::Native(function)) => {
                    let args_start = self.stack.len() - arg_count as usize;
                    let result = function(&self.stack[args_start..]);
                    // Discard the callee along with the arguments.
                    self.stack.truncate(args_start - 1);
                    self.push(result);
                    return Ok(());
                }
                None => {}
            }
        }
        Err(RuntimeError::NotCallable)
    }

    fn call_closure(&mut self, closure: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let function = self.heap.closure(closure).function;
        let (arity, chunk) = {
            let function = self.heap.function(function);
            (function.arity, Rc::clone(&function.chunk))
        };
        if arg_count != arity {
            return Err(RuntimeError::ArityMismatch {
                expected: arity,
                got: arg_count,
            });
        }
        if self.frames.len() == FRAMES_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.frames.push(CallFrame {
            closure,
            chunk,
            ip: 0,
            base: self.stack.len() - arg_count as usize - 1,
        });
        Ok(())
    }

    fn invoke(&mut self, name: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize);
        if !receiver.is_object() {
            return Err(RuntimeError::MethodOnNonInstance);
        }
        let (class, field) = match self.heap.get(receiver.as_object()) {
            Object::Instance(instance) => (instance.class, instance.fields.get(&name).copied()),
            _ => return Err(RuntimeError::MethodOnNonInstance),
        };
        if let Some(field) = field {
            // A field shadows any method of the same name; call it instead.
            let slot = self.stack.len() - arg_count as usize - 1;
            self.stack[slot] = field;
            return self.call_value(field, arg_count);
        }
        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(
        &mut self,
        class: ObjRef,
        name: ObjRef,
        arg_count: u8,
    ) -> Result<(), RuntimeError> {
        let method = self.heap.class(class).methods.get(&name).copied();
        match method {
            Some(method) => self.call_closure(method.as_object(), arg_count),
            None => Err(RuntimeError::UndefinedProperty(
                self.heap.string(name).chars.to_string(),
            )),
        }
    }

    fn bind_method(&mut self, class: ObjRef, name: ObjRef) -> Result<(), RuntimeError> {
        let method = self.heap.class(class).methods.get(&name).copied();
        let Some(method) = method else {
            return Err(RuntimeError::UndefinedProperty(
                self.heap.string(name).chars.to_string(),
            ));
        };
        let receiver = self.peek(0);
        let bound = self.alloc(Object::BoundMethod(ObjBoundMethod {
            receiver,
            method: method.as_object(),
        }));
        self.pop();
        self.push(Value::object(bound));
        Ok(())
    }

    // === Upvalues ===

    /// Return the open upvalue for a stack slot, creating and splicing one
    /// into the sorted list if none exists. Two closures capturing the same
    /// variable always share one upvalue.
    fn capture_upvalue(&mut self, slot: usize) -> ObjRef {
        let mut prev = None;
        let mut current = self.open_upvalues;
        while let Some(reference) = current {
            let upvalue = self.heap.upvalue(reference);
            let (current_slot, next) = match upvalue.slot {
                UpvalueSlot::Open(current_slot) => (current_slot, upvalue.next),
                UpvalueSlot::Closed(_) => break,
            };
            if current_slot == slot {
                return reference;
            }
            if current_slot < slot {
                break;
            }
            prev = Some(reference);
            current = next;
        }

        let created = self.alloc(Object::Upvalue(ObjUpvalue {
            slot: UpvalueSlot::Open(slot),
            next: current,
        }));
        match prev {
            None => self.open_upvalues = Some(created),
            Some(prev) => self.heap.upvalue_mut(prev).next = Some(created),
        }
        created
    }

    /// Close every open upvalue at or above `boundary`: copy the stack value
    /// into the upvalue and unlink it from the list.
    fn close_upvalues(&mut self, boundary: usize) {
        while let Some(reference) = self.open_upvalues {
            let slot = match self.heap.upvalue(reference).slot {
                UpvalueSlot::Open(slot) => slot,
                UpvalueSlot::Closed(_) => break,
            };
            if slot < boundary {
                break;
            }
            let value = self.stack[slot];
            let upvalue = self.heap.upvalue_mut(reference);
            upvalue.slot = UpvalueSlot::Closed(value);
            self.open_upvalues = upvalue.next.take();
        }
    }

    // === Error reporting ===

    /// Print the message and a stack trace from the innermost frame out,
    /// then reset the machine for the next `interpret`.
    fn report_runtime_error(&mut self, error: &RuntimeError) {
        let _ = writeln!(self.stderr, "{error}");
        for frame in self.frames.iter().rev() {
            let function = self.heap.closure(frame.closure).function;
            let line = frame.chunk.lines[frame.ip - 1];
            match self.heap.function(function).name {
                None => {
                    let _ = writeln!(self.stderr, "[line {line}] in script");
                }
                Some(name) => {
                    let _ = writeln!(
                        self.stderr,
                        "[line {line}] in {}()",
                        self.heap.string(name).chars
                    );
                }
            }
        }
        self.reset_stack();
    }
}

/// Seconds since the Unix epoch, as a number.
fn clock_native(_args: &[Value]) -> Value {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Value::number(elapsed.as_secs_f64())
}
