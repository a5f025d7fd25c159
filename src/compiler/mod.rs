//! SQL compiler
//!
//! Transforms a validated AST and field mapping into a parameterized query
//! plus the metadata the executor needs for over-fetch and refinement.
//!
//! ## Pipeline
//!
//! ```text
//! SelectStatement + FieldMapping + locale
//!   → SqlCompiler::compile() → CompiledQuery
//!   → CostEstimator::annotate() → human-readable cost (explain only)
//! ```

pub mod cost;
pub mod error;
pub mod sql;

pub use cost::{Cost, CostEstimator};
pub use error::{CompilationError, CompilationResult};
pub use sql::{
    CompiledQuery, FuzzyNode, PhoneticNode, ScoreExpression, ScoreKind, SqlCompiler,
};
