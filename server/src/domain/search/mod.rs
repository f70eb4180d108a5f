//! Search query parsing

pub mod predicate;

pub use predicate::{AttributePredicate, PredicateOp, parse_attribute_query};
