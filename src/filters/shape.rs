//! Schema-level filter argument shapes
//!
//! For each entity a `{Entity}Filter` input shape is generated with one
//! optional field per filterable column plus self-referencing `and`/`or`
//! fields. Per-scalar operator shapes (`StringFilter`, `IntFilter`, ...) are
//! shared between entities. Both are memoized in a [`FilterShapeCache`]
//! owned by whoever builds the schema.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

use crate::orm::{EntityMeta, ScalarType};

use super::operator::ComparisonOperator;

static FIELD_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9]*$").expect("valid field name pattern"));

/// Whether `name` can be used as a GraphQL input field name.
pub fn is_valid_field_name(name: &str) -> bool {
    FIELD_NAME_PATTERN.is_match(name)
}

/// Operator input shape for one scalar type, e.g. `IntFilter`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterFieldShape {
    pub name: String,
    pub scalar: ScalarType,
    /// Operator tag and whether it takes a list, in declaration order
    pub operators: Vec<(&'static str, bool)>,
}

impl FilterFieldShape {
    fn for_scalar(scalar: ScalarType) -> Self {
        Self {
            name: field_shape_name(scalar),
            scalar,
            operators: ComparisonOperator::ALL
                .iter()
                .map(|op| (op.tag(), op.takes_list()))
                .collect(),
        }
    }
}

/// `where` argument shape for one entity, e.g. `ArticleFilter`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArgumentShape {
    pub name: String,
    pub entity: &'static str,
    /// Column name and the operator shape it uses
    pub fields: Vec<(&'static str, Arc<FilterFieldShape>)>,
}

impl FilterArgumentShape {
    /// Names of the self-referencing combinator fields.
    pub const COMBINATORS: [&'static str; 2] = ["or", "and"];

    pub fn field(&self, name: &str) -> Option<&FilterFieldShape> {
        self.fields
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, shape)| shape.as_ref())
    }
}

pub fn argument_shape_name(entity: &EntityMeta) -> String {
    format!("{}Filter", entity.name)
}

pub fn field_shape_name(scalar: ScalarType) -> String {
    format!("{}Filter", scalar.graphql_name())
}

/// Append-only memo of generated filter shapes.
///
/// Entries are keyed by generated type name and never replaced, so readers
/// only ever contend on insertion.
#[derive(Debug, Default)]
pub struct FilterShapeCache {
    arguments: RwLock<HashMap<String, Arc<FilterArgumentShape>>>,
    fields: RwLock<HashMap<String, Arc<FilterFieldShape>>>,
}

impl FilterShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `{Entity}Filter` shape, built on first use.
    pub fn argument_for(&self, entity: &'static EntityMeta) -> Arc<FilterArgumentShape> {
        let name = argument_shape_name(entity);
        if let Some(shape) = self.arguments.read().get(&name) {
            return shape.clone();
        }

        let fields = entity
            .columns
            .iter()
            .filter(|c| is_valid_field_name(c.name))
            .filter_map(|c| self.field_for(c.scalar).map(|shape| (c.name, shape)))
            .collect();
        let shape = Arc::new(FilterArgumentShape {
            name: name.clone(),
            entity: entity.name,
            fields,
        });

        tracing::debug!(shape = %name, "Created filter argument shape");
        self.arguments.write().entry(name).or_insert(shape).clone()
    }

    /// The operator shape for a scalar type, or `None` if the type is not
    /// comparable.
    pub fn field_for(&self, scalar: ScalarType) -> Option<Arc<FilterFieldShape>> {
        if !scalar.is_filterable() {
            return None;
        }
        let name = field_shape_name(scalar);
        if let Some(shape) = self.fields.read().get(&name) {
            return Some(shape.clone());
        }
        let shape = Arc::new(FilterFieldShape::for_scalar(scalar));
        Some(self.fields.write().entry(name).or_insert(shape).clone())
    }

    /// All operator shapes created so far, sorted by name.
    pub fn field_shapes(&self) -> Vec<Arc<FilterFieldShape>> {
        let mut shapes: Vec<_> = self.fields.read().values().cloned().collect();
        shapes.sort_by(|a, b| a.name.cmp(&b.name));
        shapes
    }

    pub fn len(&self) -> usize {
        self.arguments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::ColumnDef;

    static REPORTER: EntityMeta = EntityMeta {
        name: "Reporter",
        plural: "Reporters",
        table: "reporters",
        primary_key: "id",
        columns: &[
            ColumnDef::new("id", ScalarType::Int).primary_key(),
            ColumnDef::new("first_name", ScalarType::String),
            ColumnDef::new("profile", ScalarType::Json).nullable(),
            ColumnDef::new("2fa-code", ScalarType::String).nullable(),
        ],
        relations: &[],
    };

    #[test]
    fn test_argument_shape_skips_unfilterable_and_invalid_names() {
        let cache = FilterShapeCache::new();
        let shape = cache.argument_for(&REPORTER);
        assert_eq!(shape.name, "ReporterFilter");
        let columns: Vec<_> = shape.fields.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, vec!["id", "first_name"]);
        assert_eq!(shape.field("first_name").map(|f| f.name.as_str()), Some("StringFilter"));
    }

    #[test]
    fn test_shapes_are_memoized() {
        let cache = FilterShapeCache::new();
        let first = cache.argument_for(&REPORTER);
        let second = cache.argument_for(&REPORTER);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let names: Vec<_> = cache.field_shapes().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["IntFilter", "StringFilter"]);
    }

    #[test]
    fn test_field_shape_lists_every_operator() {
        let shape = FilterShapeCache::new().field_for(ScalarType::Int).unwrap();
        let tags: Vec<_> = shape.operators.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tags,
            vec!["equal", "notEqual", "lessThan", "greaterThan", "like", "in"]
        );
        assert!(shape.operators.iter().any(|&(tag, list)| tag == "in" && list));
    }

    #[test]
    fn test_separate_caches_are_hermetic() {
        let a = FilterShapeCache::new();
        let b = FilterShapeCache::new();
        a.argument_for(&REPORTER);
        assert!(b.is_empty());
    }

    #[test]
    fn test_field_name_pattern() {
        assert!(is_valid_field_name("_private"));
        assert!(is_valid_field_name("reporter_id"));
        assert!(!is_valid_field_name("2fa"));
        assert!(!is_valid_field_name("has-dash"));
    }
}
