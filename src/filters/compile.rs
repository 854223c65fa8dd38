//! Predicate compiler
//!
//! Walks a [`FilterNode`] against an entity's field table and produces a
//! [`Predicate`] tree that mirrors the filter combinator-for-combinator.

use crate::error::Result;
use crate::orm::{EntityMeta, SqlValue, quote_ident};

use super::operator::ComparisonOperator;
use super::tree::{Condition, Connective, FilterExpr, FilterNode, FilterOperand, filterable_column};

/// A composable boolean condition the store can evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: ComparisonOperator,
        value: SqlValue,
    },
    /// `lower(column) LIKE lower(pattern)`
    Like { column: String, pattern: String },
    In {
        column: String,
        values: Vec<SqlValue>,
    },
    /// Children joined by `connective`. Rendered inside its own parentheses,
    /// so it composes safely with siblings.
    Group {
        connective: Connective,
        children: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op: ComparisonOperator::Equal,
            value: value.into(),
        }
    }

    pub fn all(children: Vec<Predicate>) -> Self {
        Predicate::Group {
            connective: Connective::And,
            children,
        }
    }

    pub fn any(children: Vec<Predicate>) -> Self {
        Predicate::Group {
            connective: Connective::Or,
            children,
        }
    }

    /// True for groups that constrain nothing (no non-neutral children).
    ///
    /// Neutral predicates are dropped when composed with siblings, so an
    /// empty `or` never turns a conjunction into "match everything".
    pub fn is_neutral(&self) -> bool {
        match self {
            Predicate::Group { children, .. } => children.iter().all(Predicate::is_neutral),
            _ => false,
        }
    }

    /// Render to SQL, appending bind values in placeholder order.
    pub fn to_sql(&self, binds: &mut Vec<SqlValue>) -> String {
        match self {
            Predicate::Compare { column, op, value } => match op.sql_comparison(value) {
                Some(comparison) => {
                    if comparison.contains('?') {
                        binds.push(value.clone());
                    }
                    format!("{} {}", quote_ident(column), comparison)
                }
                None => "1 = 0".to_string(),
            },
            Predicate::Like { column, pattern } => {
                binds.push(SqlValue::String(pattern.clone()));
                format!("LOWER({}) LIKE LOWER(?)", quote_ident(column))
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                binds.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                format!("{} IN ({})", quote_ident(column), placeholders)
            }
            Predicate::Group {
                connective,
                children,
            } => {
                let parts: Vec<String> = children
                    .iter()
                    .filter(|c| !c.is_neutral())
                    .map(|c| c.to_sql(binds))
                    .collect();
                match parts.len() {
                    0 => "1 = 1".to_string(),
                    1 => parts.into_iter().next().unwrap_or_default(),
                    _ => format!("({})", parts.join(connective.to_sql())),
                }
            }
        }
    }
}

/// Compile a filter for `entity`.
///
/// The top level joins its keys with AND. A nested `and`/`or` key joins its
/// own keys with that connective and is combined with its siblings by the
/// enclosing level's connective.
pub fn compile(entity: &EntityMeta, node: &FilterNode) -> Result<Predicate> {
    compile_node(entity, node, Connective::And)
}

fn compile_node(entity: &EntityMeta, node: &FilterNode, connective: Connective) -> Result<Predicate> {
    let mut children = Vec::with_capacity(node.entries.len());
    for entry in &node.entries {
        match entry {
            FilterExpr::Combinator { kind, children: nested } => {
                children.push(compile_node(entity, nested, *kind)?);
            }
            FilterExpr::Leaf(leaf) => {
                let column = filterable_column(entity, &leaf.field)?;
                match &leaf.condition {
                    Condition::Compare { op, operand } => children.push(match operand {
                        FilterOperand::Scalar(value) => op.scalar(column.name, value.clone()),
                        FilterOperand::List(values) => {
                            ComparisonOperator::list(column.name, values.clone())
                        }
                    }),
                    Condition::Unknown { tag } => {
                        tracing::warn!(
                            entity = entity.name,
                            field = %leaf.field,
                            operator = %tag,
                            "Ignoring unknown filter operator"
                        );
                    }
                }
            }
        }
    }
    Ok(Predicate::Group {
        connective,
        children,
    })
}
