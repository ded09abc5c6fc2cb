//! Shared helpers: run a source string on a fresh VM and capture its output.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rill_runtime::{InterpretError, RuntimeError, Vm};

/// A writer whose contents the test can read back after the VM is done.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("utf8 output")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A fresh VM wired to capture buffers for stdout and stderr.
pub fn vm_with_capture() -> (Vm, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::default();
    let err = SharedBuffer::default();
    let mut vm = Vm::new();
    vm.set_output(Box::new(out.clone()));
    vm.set_error_output(Box::new(err.clone()));
    (vm, out, err)
}

pub fn run(source: &str) -> (Result<(), InterpretError>, String, String) {
    let (mut vm, out, err) = vm_with_capture();
    let result = vm.interpret(source);
    (result, out.contents(), err.contents())
}

/// Run a program that must succeed; returns what it printed.
pub fn run_ok(source: &str) -> String {
    let (result, out, err) = run(source);
    assert!(result.is_ok(), "failed: {result:?}\nstderr: {err}");
    out
}

/// Run a program that must raise a runtime error; returns it with stderr.
pub fn runtime_error(source: &str) -> (RuntimeError, String) {
    let (result, _, err) = run(source);
    match result {
        Err(InterpretError::Runtime(error)) => (error, err),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

/// Run a program that must fail to compile; returns the rendered diagnostics.
pub fn compile_errors(source: &str) -> Vec<String> {
    let (result, _, _) = run(source);
    match result {
        Err(InterpretError::Compile(diagnostics)) => {
            diagnostics.iter().map(ToString::to_string).collect()
        }
        other => panic!("expected compile error, got {other:?}"),
    }
}
