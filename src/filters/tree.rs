//! Filter expression trees
//!
//! A filter arrives as JSON (`{"headline": {"like": "Foo"}, "or": {...}}`).
//! [`FilterNode::parse`] turns it into a typed tree once, checking field
//! names and value shapes against the entity, so compilation never has to
//! inspect raw JSON.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::orm::{ColumnDef, EntityMeta, ScalarType, SqlValue};

use super::operator::ComparisonOperator;

/// How the keys of a filter node are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    /// Reserved filter key for this connective.
    pub fn key(&self) -> &'static str {
        match self {
            Connective::And => "and",
            Connective::Or => "or",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "and" => Some(Connective::And),
            "or" => Some(Connective::Or),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOperand {
    Scalar(SqlValue),
    List(Vec<SqlValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        op: ComparisonOperator,
        operand: FilterOperand,
    },
    /// An operator tag outside the operator table. Compiles to nothing.
    Unknown { tag: String },
}

/// A single `field <operator> value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterLeaf {
    pub field: String,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Leaf(FilterLeaf),
    Combinator {
        kind: Connective,
        children: FilterNode,
    },
}

/// One level of a filter: a set of keys, each a leaf or a nested combinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterNode {
    pub entries: Vec<FilterExpr>,
}

impl FilterNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a comparison leaf.
    pub fn field(
        mut self,
        field: impl Into<String>,
        op: ComparisonOperator,
        value: impl Into<SqlValue>,
    ) -> Self {
        self.entries.push(FilterExpr::Leaf(FilterLeaf {
            field: field.into(),
            condition: Condition::Compare {
                op,
                operand: FilterOperand::Scalar(value.into()),
            },
        }));
        self
    }

    /// Add an `in` leaf.
    pub fn field_in(mut self, field: impl Into<String>, values: Vec<SqlValue>) -> Self {
        self.entries.push(FilterExpr::Leaf(FilterLeaf {
            field: field.into(),
            condition: Condition::Compare {
                op: ComparisonOperator::In,
                operand: FilterOperand::List(values),
            },
        }));
        self
    }

    /// Nest `children` under an `and` key.
    pub fn and(mut self, children: FilterNode) -> Self {
        self.entries.push(FilterExpr::Combinator {
            kind: Connective::And,
            children,
        });
        self
    }

    /// Nest `children` under an `or` key.
    pub fn or(mut self, children: FilterNode) -> Self {
        self.entries.push(FilterExpr::Combinator {
            kind: Connective::Or,
            children,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field names used directly at this level (combinators excluded).
    pub fn field_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                FilterExpr::Leaf(leaf) => Some(leaf.field.as_str()),
                FilterExpr::Combinator { .. } => None,
            })
            .collect()
    }

    /// Parse a wire filter for `entity`.
    ///
    /// A reserved `and`/`or` key is a combinator only when its value is an
    /// object; otherwise it is looked up as an ordinary field name.
    pub fn parse(entity: &EntityMeta, value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed("", entity.name, "a filter must be an object"))?;

        let mut entries = Vec::with_capacity(object.len());
        for (key, value) in object {
            match (Connective::from_key(key), value) {
                (Some(kind), Value::Object(_)) => entries.push(FilterExpr::Combinator {
                    kind,
                    children: FilterNode::parse(entity, value)?,
                }),
                _ => entries.push(FilterExpr::Leaf(parse_leaf(entity, key, value)?)),
            }
        }
        Ok(Self { entries })
    }
}

/// Look up a filterable column on `entity`.
pub(crate) fn filterable_column(entity: &EntityMeta, field: &str) -> Result<&'static ColumnDef> {
    entity
        .column(field)
        .filter(|c| c.scalar.is_filterable())
        .ok_or_else(|| Error::UnknownFilterField {
            field: field.to_string(),
            entity: entity.name.to_string(),
        })
}

fn parse_leaf(entity: &EntityMeta, field: &str, value: &Value) -> Result<FilterLeaf> {
    let column = filterable_column(entity, field)?;

    let condition = match value {
        Value::Object(ops) => {
            let mut iter = ops.iter();
            let (tag, operand) = match (iter.next(), iter.next()) {
                (Some(pair), None) => pair,
                _ => {
                    return Err(Error::malformed(
                        field,
                        entity.name,
                        format!("expected exactly one operator, found {}", ops.len()),
                    ));
                }
            };
            match ComparisonOperator::from_tag(tag) {
                Some(op) => Condition::Compare {
                    op,
                    operand: parse_operand(entity, column, op, operand)?,
                },
                None => Condition::Unknown { tag: tag.clone() },
            }
        }
        // Bare scalars are shorthand for `equal`
        Value::String(_) => Condition::Compare {
            op: ComparisonOperator::Equal,
            operand: FilterOperand::Scalar(coerce(column, value)?),
        },
        Value::Number(n) if n.is_i64() || n.is_u64() => Condition::Compare {
            op: ComparisonOperator::Equal,
            operand: FilterOperand::Scalar(coerce(column, value)?),
        },
        other => return Err(Error::unsupported_value(field, other, entity.name)),
    };

    Ok(FilterLeaf {
        field: field.to_string(),
        condition,
    })
}

fn parse_operand(
    entity: &EntityMeta,
    column: &ColumnDef,
    op: ComparisonOperator,
    operand: &Value,
) -> Result<FilterOperand> {
    match (op.takes_list(), operand) {
        (true, Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) | Value::Object(_) => {
                    Err(Error::unsupported_value(column.name, item, entity.name))
                }
                _ => coerce(column, item),
            })
            .collect::<Result<Vec<_>>>()
            .map(FilterOperand::List),
        (true, _) => Err(Error::malformed(
            column.name,
            entity.name,
            format!("`{}` expects a list", op.tag()),
        )),
        (false, Value::Array(_) | Value::Object(_)) => {
            Err(Error::unsupported_value(column.name, operand, entity.name))
        }
        (false, _) => Ok(FilterOperand::Scalar(coerce(column, operand)?)),
    }
}

/// Convert a scalar JSON value into the column's comparable form.
fn coerce(column: &ColumnDef, value: &Value) -> Result<SqlValue> {
    let sql = SqlValue::from_json(value).unwrap_or(SqlValue::Null);
    Ok(match (column.scalar, sql) {
        (ScalarType::Uuid, SqlValue::String(s)) => match uuid::Uuid::parse_str(&s) {
            Ok(id) => SqlValue::Uuid(id),
            Err(_) => SqlValue::String(s),
        },
        (ScalarType::Float, SqlValue::Int(i)) => SqlValue::Float(i as f64),
        (_, sql) => sql,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::RelationDef;
    use assert_matches::assert_matches;
    use serde_json::json;

    static ARTICLE: EntityMeta = EntityMeta {
        name: "Article",
        plural: "Articles",
        table: "articles",
        primary_key: "id",
        columns: &[
            ColumnDef::new("id", ScalarType::Int).primary_key(),
            ColumnDef::new("headline", ScalarType::String),
            ColumnDef::new("reporter_id", ScalarType::Int),
            ColumnDef::new("token", ScalarType::Uuid).nullable(),
            ColumnDef::new("extra", ScalarType::Json).nullable(),
        ],
        relations: &[RelationDef {
            name: "reporter",
            target: "Reporter",
            local_column: "reporter_id",
            remote_column: "id",
            multiple: false,
        }],
    };

    #[test]
    fn test_bare_scalar_is_equal() {
        let node = FilterNode::parse(&ARTICLE, &json!({"headline": "X"})).unwrap();
        assert_eq!(
            node,
            FilterNode::new().field("headline", ComparisonOperator::Equal, "X")
        );
    }

    #[test]
    fn test_operator_mapping() {
        let node = FilterNode::parse(&ARTICLE, &json!({"reporter_id": {"lessThan": 4}})).unwrap();
        assert_eq!(
            node,
            FilterNode::new().field("reporter_id", ComparisonOperator::LessThan, 4i64)
        );
    }

    #[test]
    fn test_in_requires_list() {
        let node = FilterNode::parse(&ARTICLE, &json!({"reporter_id": {"in": [1, 2]}})).unwrap();
        assert_eq!(
            node,
            FilterNode::new().field_in("reporter_id", vec![SqlValue::Int(1), SqlValue::Int(2)])
        );

        let err = FilterNode::parse(&ARTICLE, &json!({"reporter_id": {"in": 1}})).unwrap_err();
        assert_matches!(err, Error::MalformedFilter { field, .. } if field == "reporter_id");
    }

    #[test]
    fn test_more_than_one_operator_is_malformed() {
        let err = FilterNode::parse(
            &ARTICLE,
            &json!({"reporter_id": {"lessThan": 4, "greaterThan": 1}}),
        )
        .unwrap_err();
        assert_matches!(err, Error::MalformedFilter { .. });
    }

    #[test]
    fn test_bare_boolean_is_unsupported() {
        let err = FilterNode::parse(&ARTICLE, &json!({"headline": true})).unwrap_err();
        assert_matches!(
            err,
            Error::UnsupportedFilterValue { field, value_type: "boolean", entity }
                if field == "headline" && entity == "Article"
        );
    }

    #[test]
    fn test_bare_float_is_unsupported() {
        let err = FilterNode::parse(&ARTICLE, &json!({"reporter_id": 1.5})).unwrap_err();
        assert_matches!(err, Error::UnsupportedFilterValue { value_type: "float", .. });
    }

    #[test]
    fn test_unknown_operator_is_kept_for_the_compiler() {
        let node = FilterNode::parse(&ARTICLE, &json!({"headline": {"between": 1}})).unwrap();
        assert_matches!(
            &node.entries[0],
            FilterExpr::Leaf(FilterLeaf { condition: Condition::Unknown { tag }, .. }) if tag == "between"
        );
    }

    #[test]
    fn test_unknown_and_unfilterable_fields() {
        assert_matches!(
            FilterNode::parse(&ARTICLE, &json!({"nope": 1})).unwrap_err(),
            Error::UnknownFilterField { field, .. } if field == "nope"
        );
        assert_matches!(
            FilterNode::parse(&ARTICLE, &json!({"extra": "x"})).unwrap_err(),
            Error::UnknownFilterField { .. }
        );
        assert_matches!(
            FilterNode::parse(&ARTICLE, &json!({"reporter": 1})).unwrap_err(),
            Error::UnknownFilterField { .. }
        );
    }

    #[test]
    fn test_combinators_nest() {
        let node = FilterNode::parse(
            &ARTICLE,
            &json!({"or": {"id": 1, "and": {"headline": "b", "reporter_id": 3}}}),
        )
        .unwrap();
        assert_matches!(
            &node.entries[..],
            [FilterExpr::Combinator { kind: Connective::Or, children }] if children.entries.len() == 2
        );
    }

    #[test]
    fn test_uuid_strings_are_coerced() {
        let id = uuid::Uuid::new_v4();
        let node =
            FilterNode::parse(&ARTICLE, &json!({"token": id.to_string().to_uppercase()})).unwrap();
        assert_eq!(
            node,
            FilterNode::new().field("token", ComparisonOperator::Equal, id)
        );
    }

    #[test]
    fn test_combinator_key_with_scalar_value_is_a_field_lookup() {
        let err = FilterNode::parse(&ARTICLE, &json!({"and": 1})).unwrap_err();
        assert_matches!(err, Error::UnknownFilterField { field, .. } if field == "and");
    }
}
