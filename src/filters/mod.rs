//! Structured filtering for connection fields
//!
//! Filters use the operator tags:
//! - equal, notEqual
//! - lessThan, greaterThan
//! - like (case-insensitive substring)
//! - in (list membership)
//!
//! combined with nested `and` / `or` keys. A bare scalar is shorthand for
//! `equal`.

mod compile;
mod operator;
pub mod shape;
mod tree;

pub use compile::{Predicate, compile};
pub use operator::ComparisonOperator;
pub use shape::{FilterArgumentShape, FilterFieldShape, FilterShapeCache};
pub use tree::{Condition, Connective, FilterExpr, FilterLeaf, FilterNode, FilterOperand};
