//! Single-pass bytecode compiler.
//!
//! A Pratt expression parser fused with recursive descent for statements,
//! emitting into the chunk of the function currently being compiled — there
//! is no AST. Nested function compilations form a stack of states; upvalue
//! resolution walks that stack. One token of lookahead, panic-mode recovery
//! at statement boundaries.

mod expr;

use std::rc::Rc;

use crate::bytecode::{Chunk, Opcode};
use crate::diagnostic::Diagnostic;
use crate::heap::{ExternalRoots, Heap};
use crate::object::{ObjFunction, ObjRef, Object};
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Local slot operands and the locals array are byte-indexed; slot zero is
/// reserved for the receiver or callee.
const MAX_LOCALS: usize = 256;
/// Upvalue operands are byte-indexed too.
const MAX_UPVALUES: usize = 256;

/// What kind of function body a compiler state is producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Function,
    Initializer,
    Method,
    Script,
}

/// A local variable slot.
#[derive(Debug)]
pub(super) struct Local<'src> {
    name: &'src str,
    /// Scope depth, or -1 while declared but not yet defined.
    depth: i32,
    /// Captured by a closure; closed instead of popped at scope exit.
    is_captured: bool,
}

/// One upvalue capture directive, emitted after the CLOSURE instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Upvalue {
    index: u8,
    is_local: bool,
}

/// The function whose chunk is currently receiving code.
struct FunctionBuilder {
    name: Option<ObjRef>,
    arity: u8,
    chunk: Chunk,
}

/// Per-function compiler state, pushed for each nested function declaration.
struct FunctionState<'src> {
    function: FunctionBuilder,
    kind: FunctionKind,
    locals: Vec<Local<'src>>,
    upvalues: Vec<Upvalue>,
    scope_depth: i32,
}

impl<'src> FunctionState<'src> {
    fn new(kind: FunctionKind, name: Option<ObjRef>) -> Self {
        // Slot zero belongs to the callee, or to `this` inside methods.
        let slot_zero = Local {
            name: if matches!(kind, FunctionKind::Method | FunctionKind::Initializer) {
                "this"
            } else {
                ""
            },
            depth: 0,
            is_captured: false,
        };
        Self {
            function: FunctionBuilder {
                name,
                arity: 0,
                chunk: Chunk::new(),
            },
            kind,
            locals: vec![slot_zero],
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }
}

/// Per-class compiler state, for validating `this` and `super`.
struct ClassState {
    has_superclass: bool,
}

pub(super) struct Parser<'src, 'h> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    diagnostics: Vec<Diagnostic>,
    heap: &'h mut Heap,
    roots: ExternalRoots<'h>,
    states: Vec<FunctionState<'src>>,
    class_states: Vec<ClassState>,
}

/// Compile a source string to its top-level function (arity 0, no upvalues).
///
/// On any compile-time error the collected diagnostics are returned instead;
/// panic-mode recovery means one bad statement does not hide errors in the
/// next.
pub fn compile(
    source: &str,
    heap: &mut Heap,
    roots: ExternalRoots<'_>,
) -> Result<ObjRef, Vec<Diagnostic>> {
    let placeholder = Token {
        kind: TokenKind::Eof,
        lexeme: "",
        line: 0,
    };
    let mut parser = Parser {
        scanner: Scanner::new(source),
        current: placeholder,
        previous: placeholder,
        had_error: false,
        panic_mode: false,
        diagnostics: Vec::new(),
        heap,
        roots,
        states: vec![FunctionState::new(FunctionKind::Script, None)],
        class_states: Vec::new(),
    };

    parser.advance();
    while !parser.match_token(TokenKind::Eof) {
        parser.declaration();
    }

    let (function, _) = parser.end_state();
    if parser.had_error {
        Err(parser.diagnostics)
    } else {
        Ok(function)
    }
}

impl<'src, 'h> Parser<'src, 'h> {
    // === Token plumbing ===

    pub(super) fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(super) fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // === Error reporting ===

    pub(super) fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    pub(super) fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        // One diagnostic per statement; panic mode suppresses the cascade.
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        self.diagnostics.push(Diagnostic::at_token(&token, message));
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // === Emitting ===

    fn current_chunk_mut(&mut self) -> &mut Chunk {
        &mut self
            .states
            .last_mut()
            .expect("no active compiler state")
            .function
            .chunk
    }

    fn state(&self) -> &FunctionState<'src> {
        self.states.last().expect("no active compiler state")
    }

    fn state_mut(&mut self) -> &mut FunctionState<'src> {
        self.states.last_mut().expect("no active compiler state")
    }

    pub(super) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk_mut().write(byte, line);
    }

    pub(super) fn emit_op(&mut self, op: Opcode) {
        self.emit_byte(op as u8);
    }

    pub(super) fn emit_ops(&mut self, first: Opcode, second: Opcode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    pub(super) fn emit_with_operand(&mut self, op: Opcode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    fn emit_return(&mut self) {
        // Initializers implicitly return the receiver in slot zero.
        if self.state().kind == FunctionKind::Initializer {
            self.emit_with_operand(Opcode::GetLocal, 0);
        } else {
            self.emit_op(Opcode::Nil);
        }
        self.emit_op(Opcode::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.current_chunk_mut().add_constant(value);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    pub(super) fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_with_operand(Opcode::Constant, index);
    }

    /// Emit a forward jump with a placeholder offset; returns the offset of
    /// the operand for later patching.
    pub(super) fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk_mut().current_offset() - 2
    }

    pub(super) fn patch_jump(&mut self, offset: usize) {
        // -2 adjusts for the operand bytes themselves.
        let jump = self.current_chunk_mut().current_offset() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        let chunk = self.current_chunk_mut();
        chunk.code[offset] = (jump >> 8) as u8;
        chunk.code[offset + 1] = (jump & 0xff) as u8;
    }

    pub(super) fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(Opcode::Loop);
        let offset = self.current_chunk_mut().current_offset() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_byte((offset >> 8) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    // === Heap interaction ===

    /// Intern a string, collecting first when the heap asks for it. The
    /// compiler's roots are the in-progress function chain (names and
    /// constant tables) plus the caller's globals.
    pub(super) fn intern(&mut self, text: &str) -> ObjRef {
        if self.heap.needs_collection() {
            self.mark_compile_roots_and_collect();
        }
        self.heap.intern(text)
    }

    fn mark_compile_roots_and_collect(&mut self) {
        let heap = &mut *self.heap;
        for state in &self.states {
            if let Some(name) = state.function.name {
                heap.mark_object(name);
            }
            for &constant in &state.function.chunk.constants {
                heap.mark_value(constant);
            }
        }
        self.roots.mark(heap);
        heap.trace_references();
        heap.remove_unmarked_strings();
        heap.sweep();
    }

    /// Finish the innermost function: emit the implicit return, move its
    /// chunk into a heap function object, and hand back the upvalue
    /// directives for the enclosing CLOSURE instruction.
    fn end_state(&mut self) -> (ObjRef, Vec<Upvalue>) {
        self.emit_return();

        #[cfg(feature = "print-code")]
        if !self.had_error {
            let state = self.state();
            let name = match state.function.name {
                Some(name) => self.heap.string(name).chars.to_string(),
                None => "<script>".to_string(),
            };
            eprint!(
                "{}",
                crate::bytecode::disassemble(self.heap, &state.function.chunk, &name)
            );
        }

        // Collect while the finished builder is still on the state stack and
        // therefore rooted; the allocation below cannot trigger on its own.
        if self.heap.needs_collection() {
            self.mark_compile_roots_and_collect();
        }
        let state = self.states.pop().expect("no active compiler state");
        let function = self.heap.alloc(Object::Function(ObjFunction {
            arity: state.function.arity,
            upvalue_count: state.upvalues.len(),
            chunk: Rc::new(state.function.chunk),
            name: state.function.name,
        }));
        (function, state.upvalues)
    }

    // === Scopes and variables ===

    fn begin_scope(&mut self) {
        self.state_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.state_mut().scope_depth -= 1;
        let depth = self.state().scope_depth;
        loop {
            let is_captured = match self.state().locals.last() {
                Some(local) if local.depth > depth => local.is_captured,
                _ => break,
            };
            // Captured locals are hoisted to the heap; the rest just pop.
            if is_captured {
                self.emit_op(Opcode::CloseUpvalue);
            } else {
                self.emit_op(Opcode::Pop);
            }
            self.state_mut().locals.pop();
        }
    }

    /// Intern an identifier's name and store it in the constant table.
    pub(super) fn identifier_constant(&mut self, name: Token<'src>) -> u8 {
        let interned = self.intern(name.lexeme);
        self.make_constant(Value::object(interned))
    }

    fn add_local(&mut self, name: &'src str) {
        if self.state().locals.len() == MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.state_mut().locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
    }

    /// Record a local declaration, rejecting redeclaration in the same scope.
    fn declare_variable(&mut self) {
        if self.state().scope_depth == 0 {
            return;
        }
        let name = self.previous;

        let state = self.state();
        let mut duplicate = false;
        for local in state.locals.iter().rev() {
            if local.depth != -1 && local.depth < state.scope_depth {
                break;
            }
            if local.name == name.lexeme {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name.lexeme);
    }

    fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        // Locals are resolved by slot, not name; only globals need the
        // constant-table entry.
        if self.state().scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(self.previous)
    }

    fn mark_initialized(&mut self) {
        let state = self.state_mut();
        if state.scope_depth == 0 {
            return;
        }
        let depth = state.scope_depth;
        if let Some(local) = state.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: u8) {
        if self.state().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_with_operand(Opcode::DefineGlobal, global);
    }

    /// Find a local slot in the given compiler state, bottom-up for
    /// shadowing. Reading a variable in its own initializer is an error.
    pub(super) fn resolve_local(&mut self, state_index: usize, name: &str) -> Option<u8> {
        let mut found = None;
        for (index, local) in self.states[state_index].locals.iter().enumerate().rev() {
            if local.name == name {
                found = Some((index as u8, local.depth == -1));
                break;
            }
        }
        let (index, uninitialized) = found?;
        if uninitialized {
            self.error("Can't read local variable in its own initializer.");
        }
        Some(index)
    }

    /// Resolve a name against enclosing functions, threading the capture
    /// through every intermediate level.
    pub(super) fn resolve_upvalue(&mut self, state_index: usize, name: &str) -> Option<u8> {
        if state_index == 0 {
            return None;
        }
        if let Some(local) = self.resolve_local(state_index - 1, name) {
            self.states[state_index - 1].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(state_index, local, true));
        }
        if let Some(upvalue) = self.resolve_upvalue(state_index - 1, name) {
            return Some(self.add_upvalue(state_index, upvalue, false));
        }
        None
    }

    fn add_upvalue(&mut self, state_index: usize, index: u8, is_local: bool) -> u8 {
        let upvalue = Upvalue { index, is_local };
        let upvalues = &self.states[state_index].upvalues;
        // The same variable captured twice shares one slot.
        if let Some(existing) = upvalues.iter().position(|&u| u == upvalue) {
            return existing as u8;
        }
        if upvalues.len() == MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        self.states[state_index].upvalues.push(upvalue);
        (self.states[state_index].upvalues.len() - 1) as u8
    }

    // === Declarations and statements ===

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Class) {
            self.class_declaration();
        } else if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect class name.");
        let class_name = self.previous;
        let name_constant = self.identifier_constant(class_name);
        self.declare_variable();

        self.emit_with_operand(Opcode::Class, name_constant);
        self.define_variable(name_constant);

        self.class_states.push(ClassState {
            has_superclass: false,
        });

        if self.match_token(TokenKind::Less) {
            self.consume(TokenKind::Identifier, "Expect superclass name.");
            // Push the superclass by name.
            self.named_variable(self.previous, false);

            if class_name.lexeme == self.previous.lexeme {
                self.error("A class can't inherit from itself.");
            }

            // A hidden scope holds `super` so methods can capture it.
            self.begin_scope();
            self.add_local("super");
            self.define_variable(0);

            self.named_variable(class_name, false);
            self.emit_op(Opcode::Inherit);
            self.class_states
                .last_mut()
                .expect("class state missing")
                .has_superclass = true;
        }

        // Leave the class on the stack for METHOD to attach to.
        self.named_variable(class_name, false);
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.method();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.");
        self.emit_op(Opcode::Pop);

        if self
            .class_states
            .last()
            .expect("class state missing")
            .has_superclass
        {
            self.end_scope();
        }
        self.class_states.pop();
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, "Expect method name.");
        let constant = self.identifier_constant(self.previous);
        let kind = if self.previous.lexeme == "init" {
            FunctionKind::Initializer
        } else {
            FunctionKind::Method
        };
        self.function(kind);
        self.emit_with_operand(Opcode::Method, constant);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        // Defined eagerly so the body can refer to itself recursively.
        self.mark_initialized();
        self.function(FunctionKind::Function);
        self.define_variable(global);
    }

    /// Compile a function body into a fresh compiler state, then emit the
    /// CLOSURE instruction and its capture directives in the enclosing one.
    fn function(&mut self, kind: FunctionKind) {
        let name_lexeme = self.previous.lexeme;
        let name = Some(self.intern(name_lexeme));
        self.states.push(FunctionState::new(kind, name));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.state().function.arity == u8::MAX {
                    self.error_at_current("Can't have more than 255 parameters.");
                } else {
                    self.state_mut().function.arity += 1;
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        // No end_scope: the state is discarded whole, and RETURN closes any
        // captured locals at runtime.
        let (function, upvalues) = self.end_state();
        let constant = self.make_constant(Value::object(function));
        self.emit_with_operand(Opcode::Closure, constant);
        for upvalue in upvalues {
            self.emit_byte(if upvalue.is_local { 1 } else { 0 });
            self.emit_byte(upvalue.index);
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(Opcode::Nil);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        );
        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(Opcode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(Opcode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.emit_op(Opcode::Pop);
        self.statement();
        let else_jump = self.emit_jump(Opcode::Jump);

        self.patch_jump(then_jump);
        self.emit_op(Opcode::Pop);
        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk_mut().current_offset();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.emit_op(Opcode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(Opcode::Pop);
    }

    fn for_statement(&mut self) {
        // The initializer's variable lives in a scope of its own.
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");
        if self.match_token(TokenKind::Semicolon) {
            // No initializer.
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk_mut().current_offset();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(Opcode::JumpIfFalse));
            self.emit_op(Opcode::Pop);
        }

        if !self.match_token(TokenKind::RightParen) {
            // The increment textually precedes the body but runs after it:
            // jump over it into the body, then loop back to it, and from it
            // back to the condition.
            let body_jump = self.emit_jump(Opcode::Jump);
            let increment_start = self.current_chunk_mut().current_offset();
            self.expression();
            self.emit_op(Opcode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(Opcode::Pop);
        }
        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.state().kind == FunctionKind::Script {
            self.error("Can't return from top-level code.");
        }

        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.state().kind == FunctionKind::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(Opcode::Return);
        }
    }
}
