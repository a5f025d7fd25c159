//! PQL syntax error types

use std::fmt;

/// Error raised by the lexer or parser for malformed query text
///
/// Carries the character position of the offending input so callers can
/// render a marker against the original query string.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    /// What went wrong
    pub message: String,
    /// Character offset into the query text
    pub position: usize,
}

impl SyntaxError {
    /// Create a new syntax error at the given position
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        SyntaxError {
            message: message.into(),
            position,
        }
    }

    /// Syntax error for an unexpected token
    pub fn unexpected(found: impl fmt::Display, position: usize) -> Self {
        SyntaxError {
            message: format!("Unexpected token '{}'", found),
            position,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Syntax error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Result type for lexing and parsing
pub type SyntaxResult<T> = Result<T, SyntaxError>;
