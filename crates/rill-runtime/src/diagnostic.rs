//! Compile-time diagnostics.
//!
//! Every compile error flows through [`Diagnostic`] so the CLI, the REPL and
//! the tests all see the same rendering.

use std::fmt;

use crate::token::{Token, TokenKind};

/// A single compile-time error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Source line the offending token is on (1-based).
    pub line: u32,
    /// Where the error was noticed: `at 'lexeme'`, `at end`, or empty for
    /// errors reported on scanner error tokens.
    pub location: String,
    /// The error message itself.
    pub message: String,
}

impl Diagnostic {
    /// Build a diagnostic pointing at the given token.
    pub fn at_token(token: &Token<'_>, message: impl Into<String>) -> Self {
        let location = match token.kind {
            TokenKind::Eof => " at end".to_string(),
            // The scanner already put the message into the lexeme.
            TokenKind::Error => String::new(),
            _ => format!(" at '{}'", token.lexeme),
        };
        Self {
            line: token.line,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error{}: {}", self.line, self.location, self.message)
    }
}
