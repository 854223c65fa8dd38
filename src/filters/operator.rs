//! Comparison operator table
//!
//! Maps an operator tag from the filter wire shape to the predicate fragment
//! it produces for a column.

use crate::orm::SqlValue;

use super::compile::Predicate;

/// Operators a filter leaf can apply to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    /// Case-insensitive substring match
    Like,
    /// Set membership; the only operator taking a list
    In,
}

impl ComparisonOperator {
    /// Every operator, in the order filter field shapes list them.
    pub const ALL: [ComparisonOperator; 6] = [
        ComparisonOperator::Equal,
        ComparisonOperator::NotEqual,
        ComparisonOperator::LessThan,
        ComparisonOperator::GreaterThan,
        ComparisonOperator::Like,
        ComparisonOperator::In,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "equal" => Some(ComparisonOperator::Equal),
            "notEqual" => Some(ComparisonOperator::NotEqual),
            "lessThan" => Some(ComparisonOperator::LessThan),
            "greaterThan" => Some(ComparisonOperator::GreaterThan),
            "like" => Some(ComparisonOperator::Like),
            "in" => Some(ComparisonOperator::In),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "equal",
            ComparisonOperator::NotEqual => "notEqual",
            ComparisonOperator::LessThan => "lessThan",
            ComparisonOperator::GreaterThan => "greaterThan",
            ComparisonOperator::Like => "like",
            ComparisonOperator::In => "in",
        }
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, ComparisonOperator::In)
    }

    /// Build the predicate for a scalar operand.
    ///
    /// `In` with a scalar operand is treated as a one-element set.
    pub fn scalar(&self, column: &str, value: SqlValue) -> Predicate {
        match self {
            // Nothing is like NULL
            ComparisonOperator::Like if value.is_null() => Self::list(column, Vec::new()),
            ComparisonOperator::Like => Predicate::Like {
                column: column.to_string(),
                pattern: format!("%{}%", value.as_text()),
            },
            ComparisonOperator::In => Predicate::In {
                column: column.to_string(),
                values: vec![value],
            },
            op => Predicate::Compare {
                column: column.to_string(),
                op: *op,
                value,
            },
        }
    }

    /// Build a set-membership predicate.
    pub fn list(column: &str, values: Vec<SqlValue>) -> Predicate {
        Predicate::In {
            column: column.to_string(),
            values,
        }
    }

    /// SQL comparison for `Compare` predicates.
    ///
    /// The fragment holds a `?` exactly when `value` must be bound. `None`
    /// means no row can satisfy the comparison, as with ordering against NULL.
    pub(crate) fn sql_comparison(&self, value: &SqlValue) -> Option<&'static str> {
        match (self, value.is_null()) {
            (ComparisonOperator::Equal, true) => Some("IS NULL"),
            (ComparisonOperator::NotEqual, true) => Some("IS NOT NULL"),
            (_, true) => None,
            (ComparisonOperator::Equal, false) => Some("= ?"),
            (ComparisonOperator::NotEqual, false) => Some("!= ?"),
            (ComparisonOperator::LessThan, false) => Some("< ?"),
            (ComparisonOperator::GreaterThan, false) => Some("> ?"),
            (ComparisonOperator::Like, false) | (ComparisonOperator::In, false) => Some("= ?"),
        }
    }
}
