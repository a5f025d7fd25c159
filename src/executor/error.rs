//! Engine error types

use std::fmt;

use crate::compiler::CompilationError;
use crate::executor::StorageError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that propagate out of `query`/`count` unmodified
///
/// Syntax and validation failures never appear here; the engine converts
/// them into structured outcomes before execution starts.
#[derive(Debug)]
pub enum EngineError {
    /// Field mapping metadata insufficient for its declared storage kind
    Compilation(CompilationError),
    /// Storage round-trip failure
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Compilation(e) => write!(f, "compilation error: {}", e),
            EngineError::Storage(e) => write!(f, "execution error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Compilation(e) => Some(e),
            EngineError::Storage(e) => Some(e),
        }
    }
}

impl From<CompilationError> for EngineError {
    fn from(e: CompilationError) -> Self {
        EngineError::Compilation(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}
