//! Expression parsing: the Pratt rule table and its handlers.
//!
//! Each token kind maps to an optional prefix handler, an optional infix
//! handler, and an infix binding power. `parse_precedence` consumes one
//! prefix expression, then folds in infix operators of at least the given
//! precedence. Handlers that can produce an assignable target receive a
//! flag saying whether `=` may follow.

use super::Parser;
use crate::bytecode::Opcode;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Binding powers, low to high. An infix operator binds its right operand
/// one level tighter than itself (left associativity); assignment re-enters
/// at its own level and therefore chains right-associatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'src, 'h> = fn(&mut Parser<'src, 'h>, bool);

struct ParseRule<'src, 'h> {
    prefix: Option<ParseFn<'src, 'h>>,
    infix: Option<ParseFn<'src, 'h>>,
    precedence: Precedence,
}

/// The rule table, one entry per token kind.
fn rule<'src, 'h>(kind: TokenKind) -> ParseRule<'src, 'h> {
    use Precedence as P;
    let (prefix, infix, precedence): (
        Option<ParseFn<'src, 'h>>,
        Option<ParseFn<'src, 'h>>,
        Precedence,
    ) = match kind {
        TokenKind::LeftParen => (Some(grouping), Some(call), P::Call),
        TokenKind::Dot => (None, Some(dot), P::Call),
        TokenKind::Minus => (Some(unary), Some(binary), P::Term),
        TokenKind::Plus => (None, Some(binary), P::Term),
        TokenKind::Slash | TokenKind::Star => (None, Some(binary), P::Factor),
        TokenKind::Bang => (Some(unary), None, P::None),
        TokenKind::BangEqual | TokenKind::EqualEqual => (None, Some(binary), P::Equality),
        TokenKind::Greater
        | TokenKind::GreaterEqual
        | TokenKind::Less
        | TokenKind::LessEqual => (None, Some(binary), P::Comparison),
        TokenKind::Identifier => (Some(variable), None, P::None),
        TokenKind::String => (Some(string), None, P::None),
        TokenKind::Number => (Some(number), None, P::None),
        TokenKind::And => (None, Some(and), P::And),
        TokenKind::Or => (None, Some(or), P::Or),
        TokenKind::False | TokenKind::Nil | TokenKind::True => (Some(literal), None, P::None),
        TokenKind::Super => (Some(super_), None, P::None),
        TokenKind::This => (Some(this), None, P::None),
        _ => (None, None, P::None),
    };
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

impl<'src, 'h> Parser<'src, 'h> {
    pub(super) fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Parse anything at the given precedence level or tighter.
    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };

        // Assignment is only legal when nothing tighter encloses the target.
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = rule(self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        // A target parser that was not allowed to take the '=' leaves it
        // unconsumed; that spells an invalid assignment target.
        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    /// Load or store a variable, resolving local, then upvalue, then global.
    pub(super) fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let state_index = self.states.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(state_index, name.lexeme)
        {
            (Opcode::GetLocal, Opcode::SetLocal, slot)
        } else if let Some(upvalue) = self.resolve_upvalue(state_index, name.lexeme) {
            (Opcode::GetUpvalue, Opcode::SetUpvalue, upvalue)
        } else {
            let constant = self.identifier_constant(name);
            (Opcode::GetGlobal, Opcode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_with_operand(set_op, arg);
        } else {
            self.emit_with_operand(get_op, arg);
        }
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: u8 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count == u8::MAX {
                    self.error("Can't have more than 255 arguments.");
                } else {
                    count += 1;
                }
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count
    }
}

fn grouping(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    parser.expression();
    parser.consume(TokenKind::RightParen, "Expect ')' after expression.");
}

fn number(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    let value: f64 = parser
        .previous
        .lexeme
        .parse()
        .expect("number token lexeme parses");
    parser.emit_constant(Value::number(value));
}

fn string(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    // Trim the surrounding quotes.
    let lexeme = parser.previous.lexeme;
    let text = &lexeme[1..lexeme.len() - 1];
    let interned = parser.intern(text);
    parser.emit_constant(Value::object(interned));
}

fn literal(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    match parser.previous.kind {
        TokenKind::False => parser.emit_op(Opcode::False),
        TokenKind::Nil => parser.emit_op(Opcode::Nil),
        TokenKind::True => parser.emit_op(Opcode::True),
        _ => unreachable!("literal rule on non-literal token"),
    }
}

fn variable(parser: &mut Parser<'_, '_>, can_assign: bool) {
    parser.named_variable(parser.previous, can_assign);
}

fn unary(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    let operator = parser.previous.kind;
    // Operand first; the instruction pops its result.
    parser.parse_precedence(Precedence::Unary);
    match operator {
        TokenKind::Bang => parser.emit_op(Opcode::Not),
        TokenKind::Minus => parser.emit_op(Opcode::Negate),
        _ => unreachable!("unary rule on non-unary token"),
    }
}

fn binary(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    let operator = parser.previous.kind;
    parser.parse_precedence(rule(operator).precedence.next());

    match operator {
        TokenKind::BangEqual => parser.emit_ops(Opcode::Equal, Opcode::Not),
        TokenKind::EqualEqual => parser.emit_op(Opcode::Equal),
        TokenKind::Greater => parser.emit_op(Opcode::Greater),
        TokenKind::GreaterEqual => parser.emit_ops(Opcode::Less, Opcode::Not),
        TokenKind::Less => parser.emit_op(Opcode::Less),
        TokenKind::LessEqual => parser.emit_ops(Opcode::Greater, Opcode::Not),
        TokenKind::Plus => parser.emit_op(Opcode::Add),
        TokenKind::Minus => parser.emit_op(Opcode::Subtract),
        TokenKind::Star => parser.emit_op(Opcode::Multiply),
        TokenKind::Slash => parser.emit_op(Opcode::Divide),
        _ => unreachable!("binary rule on non-binary token"),
    }
}

fn and(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    // Short-circuit: with a falsey left operand, skip the right one and
    // leave the left value as the result.
    let end_jump = parser.emit_jump(Opcode::JumpIfFalse);
    parser.emit_op(Opcode::Pop);
    parser.parse_precedence(Precedence::And);
    parser.patch_jump(end_jump);
}

fn or(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    let else_jump = parser.emit_jump(Opcode::JumpIfFalse);
    let end_jump = parser.emit_jump(Opcode::Jump);

    parser.patch_jump(else_jump);
    parser.emit_op(Opcode::Pop);
    parser.parse_precedence(Precedence::Or);
    parser.patch_jump(end_jump);
}

fn call(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    let arg_count = parser.argument_list();
    parser.emit_with_operand(Opcode::Call, arg_count);
}

fn dot(parser: &mut Parser<'_, '_>, can_assign: bool) {
    parser.consume(TokenKind::Identifier, "Expect property name after '.'.");
    let name = parser.identifier_constant(parser.previous);

    if can_assign && parser.match_token(TokenKind::Equal) {
        parser.expression();
        parser.emit_with_operand(Opcode::SetProperty, name);
    } else if parser.match_token(TokenKind::LeftParen) {
        // Fused property access + call.
        let arg_count = parser.argument_list();
        parser.emit_with_operand(Opcode::Invoke, name);
        parser.emit_byte(arg_count);
    } else {
        parser.emit_with_operand(Opcode::GetProperty, name);
    }
}

fn this(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    if parser.class_states.is_empty() {
        parser.error("Can't use 'this' outside of a class.");
        return;
    }
    // `this` is local slot zero of every method; plain variable lookup
    // finds it, and never as an assignment target.
    variable(parser, false);
}

fn super_(parser: &mut Parser<'_, '_>, _can_assign: bool) {
    match parser.class_states.last() {
        None => parser.error("Can't use 'super' outside of a class."),
        Some(class) if !class.has_superclass => {
            parser.error("Can't use 'super' in a class with no superclass.");
        }
        Some(_) => {}
    }

    parser.consume(TokenKind::Dot, "Expect '.' after 'super'.");
    parser.consume(TokenKind::Identifier, "Expect superclass method name.");
    let name = parser.identifier_constant(parser.previous);

    // The receiver and the superclass both come from the enclosing scopes.
    parser.named_variable(Token::synthetic("this"), false);
    if parser.match_token(TokenKind::LeftParen) {
        let arg_count = parser.argument_list();
        parser.named_variable(Token::synthetic("super"), false);
        parser.emit_with_operand(Opcode::SuperInvoke, name);
        parser.emit_byte(arg_count);
    } else {
        parser.named_variable(Token::synthetic("super"), false);
        parser.emit_with_operand(Opcode::GetSuper, name);
    }
}
