//! PQL language front-end - lexing, parsing, and validation
//!
//! This module provides:
//! - `Lexer`: Tokenizes raw query text
//! - `Parser`: Builds the immutable AST from tokens
//! - `Validator`: Checks the AST against a field mapping

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod validator;

pub use ast::*;
pub use error::{SyntaxError, SyntaxResult};
pub use lexer::{Lexer, Token};
pub use parser::Parser;
pub use validator::{ValidationReport, Validator};
