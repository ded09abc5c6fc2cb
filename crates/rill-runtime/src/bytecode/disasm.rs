//! Bytecode disassembler.
//!
//! Pure formatting over a chunk; output is deterministic for a given chunk,
//! so golden tests can compare it verbatim.

use crate::bytecode::{Chunk, Opcode};
use crate::heap::Heap;

/// Render a whole chunk under a `== name ==` header.
pub fn disassemble(heap: &Heap, chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.code.len() {
        let (text, next) = disassemble_instruction(heap, chunk, offset);
        out.push_str(&text);
        offset = next;
    }
    out
}

/// Render the instruction at `offset`; returns the text (newline-terminated)
/// and the offset of the next instruction.
pub fn disassemble_instruction(heap: &Heap, chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut out = format!("{offset:04} ");
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        out.push_str("   | ");
    } else {
        out.push_str(&format!("{:4} ", chunk.lines[offset]));
    }

    let opcode = match Opcode::try_from(chunk.code[offset]) {
        Ok(op) => op,
        Err(_) => {
            out.push_str(&format!("Unknown opcode {}\n", chunk.code[offset]));
            return (out, offset + 1);
        }
    };

    let next = match opcode {
        Opcode::Constant => constant_instruction(&mut out, "OP_CONSTANT", heap, chunk, offset),
        Opcode::Nil => simple_instruction(&mut out, "OP_NIL", offset),
        Opcode::True => simple_instruction(&mut out, "OP_TRUE", offset),
        Opcode::False => simple_instruction(&mut out, "OP_FALSE", offset),
        Opcode::Pop => simple_instruction(&mut out, "OP_POP", offset),
        Opcode::GetLocal => byte_instruction(&mut out, "OP_GET_LOCAL", chunk, offset),
        Opcode::SetLocal => byte_instruction(&mut out, "OP_SET_LOCAL", chunk, offset),
        Opcode::GetGlobal => constant_instruction(&mut out, "OP_GET_GLOBAL", heap, chunk, offset),
        Opcode::DefineGlobal => {
            constant_instruction(&mut out, "OP_DEFINE_GLOBAL", heap, chunk, offset)
        }
        Opcode::SetGlobal => constant_instruction(&mut out, "OP_SET_GLOBAL", heap, chunk, offset),
        Opcode::GetUpvalue => byte_instruction(&mut out, "OP_GET_UPVALUE", chunk, offset),
        Opcode::SetUpvalue => byte_instruction(&mut out, "OP_SET_UPVALUE", chunk, offset),
        Opcode::GetProperty => {
            constant_instruction(&mut out, "OP_GET_PROPERTY", heap, chunk, offset)
        }
        Opcode::SetProperty => {
            constant_instruction(&mut out, "OP_SET_PROPERTY", heap, chunk, offset)
        }
        Opcode::GetSuper => constant_instruction(&mut out, "OP_GET_SUPER", heap, chunk, offset),
        Opcode::Equal => simple_instruction(&mut out, "OP_EQUAL", offset),
        Opcode::Greater => simple_instruction(&mut out, "OP_GREATER", offset),
        Opcode::Less => simple_instruction(&mut out, "OP_LESS", offset),
        Opcode::Add => simple_instruction(&mut out, "OP_ADD", offset),
        Opcode::Subtract => simple_instruction(&mut out, "OP_SUBTRACT", offset),
        Opcode::Multiply => simple_instruction(&mut out, "OP_MULTIPLY", offset),
        Opcode::Divide => simple_instruction(&mut out, "OP_DIVIDE", offset),
        Opcode::Not => simple_instruction(&mut out, "OP_NOT", offset),
        Opcode::Negate => simple_instruction(&mut out, "OP_NEGATE", offset),
        Opcode::Print => simple_instruction(&mut out, "OP_PRINT", offset),
        Opcode::Jump => jump_instruction(&mut out, "OP_JUMP", 1, chunk, offset),
        Opcode::JumpIfFalse => jump_instruction(&mut out, "OP_JUMP_IF_FALSE", 1, chunk, offset),
        Opcode::Loop => jump_instruction(&mut out, "OP_LOOP", -1, chunk, offset),
        Opcode::Call => byte_instruction(&mut out, "OP_CALL", chunk, offset),
        Opcode::Invoke => invoke_instruction(&mut out, "OP_INVOKE", heap, chunk, offset),
        Opcode::SuperInvoke => invoke_instruction(&mut out, "OP_SUPER_INVOKE", heap, chunk, offset),
        Opcode::Closure => closure_instruction(&mut out, heap, chunk, offset),
        Opcode::CloseUpvalue => simple_instruction(&mut out, "OP_CLOSE_UPVALUE", offset),
        Opcode::Return => simple_instruction(&mut out, "OP_RETURN", offset),
        Opcode::Class => constant_instruction(&mut out, "OP_CLASS", heap, chunk, offset),
        Opcode::Inherit => simple_instruction(&mut out, "OP_INHERIT", offset),
        Opcode::Method => constant_instruction(&mut out, "OP_METHOD", heap, chunk, offset),
    };
    (out, next)
}

fn simple_instruction(out: &mut String, name: &str, offset: usize) -> usize {
    out.push_str(name);
    out.push('\n');
    offset + 1
}

fn byte_instruction(out: &mut String, name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    out.push_str(&format!("{name:<16} {slot:4}\n"));
    offset + 2
}

fn constant_instruction(
    out: &mut String,
    name: &str,
    heap: &Heap,
    chunk: &Chunk,
    offset: usize,
) -> usize {
    let constant = chunk.code[offset + 1] as usize;
    let shown = heap.show(chunk.constants[constant]);
    out.push_str(&format!("{name:<16} {constant:4} '{shown}'\n"));
    offset + 2
}

fn invoke_instruction(
    out: &mut String,
    name: &str,
    heap: &Heap,
    chunk: &Chunk,
    offset: usize,
) -> usize {
    let constant = chunk.code[offset + 1] as usize;
    let arg_count = chunk.code[offset + 2];
    let shown = heap.show(chunk.constants[constant]);
    out.push_str(&format!("{name:<16} ({arg_count} args) {constant:4} '{shown}'\n"));
    offset + 3
}

fn jump_instruction(out: &mut String, name: &str, sign: i32, chunk: &Chunk, offset: usize) -> usize {
    let jump = ((chunk.code[offset + 1] as u16) << 8) | chunk.code[offset + 2] as u16;
    let target = offset as i64 + 3 + sign as i64 * jump as i64;
    out.push_str(&format!("{name:<16} {offset:4} -> {target}\n"));
    offset + 3
}

fn closure_instruction(out: &mut String, heap: &Heap, chunk: &Chunk, offset: usize) -> usize {
    let mut offset = offset + 1;
    let constant = chunk.code[offset] as usize;
    offset += 1;
    let shown = heap.show(chunk.constants[constant]);
    out.push_str(&format!("{:<16} {constant:4} {shown}\n", "OP_CLOSURE"));

    let function = chunk.constants[constant].as_object();
    for _ in 0..heap.function(function).upvalue_count {
        let is_local = chunk.code[offset];
        let index = chunk.code[offset + 1];
        offset += 2;
        out.push_str(&format!(
            "{:04}      |                     {} {}\n",
            offset - 2,
            if is_local == 1 { "local" } else { "upvalue" },
            index
        ));
    }
    offset
}
