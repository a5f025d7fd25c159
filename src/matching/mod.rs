//! Approximate string matching
//!
//! Similarity scoring and phonetic encoding used by the executor to refine
//! over-fetched candidate rows for predicates SQL cannot express exactly.

pub mod fuzzy;
pub mod phonetic;

pub use fuzzy::FuzzyMatcher;
pub use phonetic::{PhoneticCodes, PhoneticMatcher};
