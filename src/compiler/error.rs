//! Compiler error types

use std::fmt;

/// Compilation error
///
/// Raised when a field descriptor lacks the metadata its declared storage
/// kind requires. Unlike syntax and validation problems, these indicate a
/// broken mapping supplied by the caller and propagate unmodified.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilationError {
    /// BaseColumn descriptor without a physical column name
    MissingColumn(String),
    /// EavAttribute descriptor without an attribute identifier
    MissingAttributeId(String),
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilationError::MissingColumn(field) => {
                write!(f, "Field '{}' is declared as a base column but has no column name", field)
            }
            CompilationError::MissingAttributeId(field) => {
                write!(f, "Field '{}' is declared as an EAV attribute but has no attribute id", field)
            }
        }
    }
}

impl std::error::Error for CompilationError {}

/// Result type for compilation
pub type CompilationResult<T> = Result<T, CompilationError>;
