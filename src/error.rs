//! Error types for the connection pipeline
//!
//! Store failures are carried through `Error::Database` untouched so callers
//! can match on the underlying `sqlx::Error` kind.

use std::collections::BTreeSet;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A filter leaf carried a value that is neither a one-operator mapping
    /// nor a string/integer/unique-identifier scalar.
    #[error("filter for value type {value_type} on field `{field}` of entity `{entity}` is not implemented")]
    UnsupportedFilterValue {
        field: String,
        value_type: &'static str,
        entity: String,
    },

    #[error("malformed filter on field `{field}` of entity `{entity}`: {reason}")]
    MalformedFilter {
        field: String,
        entity: String,
        reason: String,
    },

    #[error("entity `{entity}` has no filterable field `{field}`")]
    UnknownFilterField { field: String, entity: String },

    /// Required filter keys absent from the caller's filter map.
    #[error("missing required filters: {}", format_keys(.0))]
    MissingRequiredFilter(BTreeSet<String>),

    #[error(
        "cannot create sort argument for {type_name}: a backing entity is required; \
         disable the sort argument explicitly to build this field without one"
    )]
    SortArgumentConstruction { type_name: String },

    #[error("`{value}` is not a value of sort enum {type_name}")]
    UnknownSortValue { value: String, type_name: String },

    #[error("invalid pagination argument: {0}")]
    InvalidPaginationArgument(String),

    /// A correlated relationship filter matched more than one related row.
    #[error("multiple rows were found for a correlated filter on `{entity}` when exactly one was required")]
    MultipleResultsFound { entity: String },

    #[error("no database session in the resolver context")]
    MissingSession,

    #[error("no entity type registered for `{0}`")]
    UnknownEntity(String),

    #[error("entity `{entity}` is already associated with type `{existing}`")]
    DuplicateEntityType { entity: String, existing: String },

    #[error("schema build failed: {0}")]
    Schema(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn format_keys(keys: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("'{}'", k)).collect();
    format!("{{{}}}", quoted.join(", "))
}

impl Error {
    /// Build an `UnsupportedFilterValue` for a JSON value.
    pub(crate) fn unsupported_value(field: &str, value: &serde_json::Value, entity: &str) -> Self {
        Error::UnsupportedFilterValue {
            field: field.to_string(),
            value_type: json_type_name(value),
            entity: entity.to_string(),
        }
    }

    pub(crate) fn malformed(field: &str, entity: &str, reason: impl Into<String>) -> Self {
        Error::MalformedFilter {
            field: field.to_string(),
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }
}

/// Name of a JSON value's type as reported in filter errors.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "float",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_filter_lists_keys() {
        let keys: BTreeSet<String> = ["reporter_id".to_string()].into_iter().collect();
        let err = Error::MissingRequiredFilter(keys);
        assert_eq!(err.to_string(), "missing required filters: {'reporter_id'}");
    }

    #[test]
    fn test_unsupported_value_names_field_type_and_entity() {
        let err = Error::unsupported_value("published", &serde_json::json!(true), "Article");
        let msg = err.to_string();
        assert!(msg.contains("boolean"));
        assert!(msg.contains("`published`"));
        assert!(msg.contains("`Article`"));
    }

    #[test]
    fn test_store_errors_are_transparent() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), sqlx::Error::RowNotFound.to_string());
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
    }
}
