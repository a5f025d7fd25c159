//! Query execution
//!
//! The executor orchestrates the validate/explain/query/count entry points
//! and owns the two-phase strategy for approximate predicates: a broad SQL
//! pre-filter shrinks the candidate set, then the matchers refine the
//! over-fetched rows in process before final pagination.

pub mod engine;
pub mod error;
pub mod row;

pub use engine::{
    CountOutcome, Explanation, QueryEngine, QueryMeta, QueryOptions, QueryOutcome,
    ValidationOutcome,
};
pub use error::{EngineError, EngineResult};
pub use row::{Datum, Row};

use async_trait::async_trait;
use thiserror::Error;

use crate::pql::ast::Value;

/// Storage fetch multiplier applied when fuzzy or un-indexed phonetic
/// predicates require in-process refinement
pub const OVER_FETCH_FACTOR: u64 = 5;

/// Storage operation errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection could not be established or was lost
    #[error("storage connection failed: {0}")]
    Connection(String),

    /// The storage layer rejected or failed the query
    #[error("query failed: {0}")]
    Query(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The host's parameterized query-execution facility
///
/// The engine performs no other I/O; this round-trip is its only suspending
/// operation. Implementations bind the values positionally and must never
/// interpolate them into the SQL text.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Execute a parameterized query and return the fetched rows
    async fn fetch(&self, sql: &str, bindings: &[Value]) -> StorageResult<Vec<Row>>;
}
