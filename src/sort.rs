//! Sort enums and sort arguments
//!
//! Each sortable column yields two enum values, `{COLUMN}_ASC` and
//! `{COLUMN}_DESC`. A sort argument is one such value or a list of them,
//! applied as ORDER BY terms left to right.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::filters::shape::is_valid_field_name;
use crate::orm::{EntityMeta, OrderDirection, quote_ident};

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: OrderDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{} {}", quote_ident(&self.column), self.direction.to_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEnumValue {
    pub name: String,
    pub spec: SortSpec,
}

/// The sort enum of an entity, e.g. `ArticleSortEnum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEnum {
    pub name: String,
    pub values: Vec<SortEnumValue>,
    /// Values applied when the caller omits the argument
    pub default: Vec<String>,
}

impl SortEnum {
    /// Derive the sort enum for an entity. Defaults to primary key ascending.
    ///
    /// Columns whose names are not valid GraphQL names get no values.
    pub fn for_entity(entity: &EntityMeta) -> Self {
        let values: Vec<SortEnumValue> = entity
            .columns
            .iter()
            .filter(|c| c.scalar.is_sortable() && is_valid_field_name(c.name))
            .flat_map(|c| {
                [OrderDirection::Asc, OrderDirection::Desc].map(|direction| SortEnumValue {
                    name: sort_value_name(c.name, direction),
                    spec: SortSpec {
                        column: c.name.to_string(),
                        direction,
                    },
                })
            })
            .collect();

        let primary = sort_value_name(entity.primary_key, OrderDirection::Asc);
        let default = if values.iter().any(|v| v.name == primary) {
            vec![primary]
        } else {
            Vec::new()
        };

        Self {
            name: format!("{}SortEnum", entity.name),
            values,
            default,
        }
    }

    pub fn value(&self, name: &str) -> Option<&SortEnumValue> {
        self.values.iter().find(|v| v.name == name)
    }

    /// Default argument as specs.
    pub fn default_argument(&self) -> Option<SortArgument> {
        let specs: Vec<SortSpec> = self
            .default
            .iter()
            .filter_map(|name| self.value(name).map(|v| v.spec.clone()))
            .collect();
        (!specs.is_empty()).then_some(SortArgument::Many(specs))
    }
}

/// `{COLUMN}_ASC` / `{COLUMN}_DESC`
pub fn sort_value_name(column: &str, direction: OrderDirection) -> String {
    format!("{}_{}", column.to_uppercase(), direction.suffix())
}

/// Caller-supplied sort: a single value or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortArgument {
    Single(SortSpec),
    Many(Vec<SortSpec>),
}

impl SortArgument {
    pub fn specs(&self) -> &[SortSpec] {
        match self {
            SortArgument::Single(spec) => std::slice::from_ref(spec),
            SortArgument::Many(specs) => specs,
        }
    }

    /// Parse enum value names (a string or a list of strings).
    pub fn parse(sort_enum: &SortEnum, value: &Value) -> Result<Self> {
        let lookup = |v: &Value| -> Result<SortSpec> {
            let name = v.as_str().ok_or_else(|| Error::UnknownSortValue {
                value: v.to_string(),
                type_name: sort_enum.name.clone(),
            })?;
            sort_enum
                .value(name)
                .map(|value| value.spec.clone())
                .ok_or_else(|| Error::UnknownSortValue {
                    value: name.to_string(),
                    type_name: sort_enum.name.clone(),
                })
        };

        match value {
            Value::Array(items) => items
                .iter()
                .map(lookup)
                .collect::<Result<Vec<_>>>()
                .map(SortArgument::Many),
            single => lookup(single).map(SortArgument::Single),
        }
    }
}
