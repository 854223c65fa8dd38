//! Connection field definitions
//!
//! A [`ConnectionField`] bundles what a schema field needs to resolve a
//! connection: the connection type, the optional sort enum and `where`
//! shape, required filter keys, and an optional custom resolver.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::filters::{FilterArgumentShape, FilterShapeCache, Predicate};
use crate::orm::{EntityMeta, FromSqlRow, Record, RelationDef, SqlValue};
use crate::pagination::ConnectionArgs;
use crate::registry::{ConnectionType, Registry};
use crate::sort::SortEnum;

use super::args::ResolveArgs;
use super::resolve::{ConnectionResolution, ResolverOutcome, connection_resolver};

/// Custom resolver invoked with the parent value and the call's arguments.
pub type CustomResolver<P, T> = Arc<dyn Fn(&P, &ResolveArgs) -> ResolverOutcome<T> + Send + Sync>;

/// Predicate derived from the parent value, e.g. a relationship join.
pub type ScopeFn<P> = Arc<dyn Fn(&P) -> Option<Predicate> + Send + Sync>;

/// Builds the connection field for a relationship of a schema-generated
/// entity. [`default_connection_field_factory`] is used unless an entity
/// type overrides it.
pub type ConnectionFieldFactory = Arc<
    dyn Fn(&'static RelationDef, &Registry) -> Result<ConnectionField<Record, Record>> + Send + Sync,
>;

/// How a connection field gets its sort argument.
#[derive(Debug, Clone, Default)]
pub enum SortOption {
    /// Derive the sort enum from the backing entity
    #[default]
    Auto,
    /// No sort argument
    Disabled,
    Explicit(SortEnum),
}

pub struct ConnectionField<P, T> {
    name: String,
    connection: ConnectionType,
    sort: Option<SortEnum>,
    where_shape: Option<Arc<FilterArgumentShape>>,
    required: BTreeSet<String>,
    resolver: Option<CustomResolver<P, T>>,
    scope: Option<ScopeFn<P>>,
}

impl<P, T> Clone for ConnectionField<P, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            connection: self.connection.clone(),
            sort: self.sort.clone(),
            where_shape: self.where_shape.clone(),
            required: self.required.clone(),
            resolver: self.resolver.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<P, T> std::fmt::Debug for ConnectionField<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionField")
            .field("name", &self.name)
            .field("connection", &self.connection.name)
            .field("sort", &self.sort.as_ref().map(|s| &s.name))
            .field("where", &self.where_shape.as_ref().map(|s| &s.name))
            .field("required", &self.required)
            .field("custom_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl<P, T> ConnectionField<P, T> {
    /// A connection field without sort or `where` arguments.
    pub fn unsorted(name: impl Into<String>, connection: ConnectionType) -> Self {
        Self {
            name: name.into(),
            connection,
            sort: None,
            where_shape: None,
            required: BTreeSet::new(),
            resolver: None,
            scope: None,
        }
    }

    /// A sorted connection field.
    pub fn new(name: impl Into<String>, connection: ConnectionType, sort: SortOption) -> Result<Self> {
        Self::unsorted(name, connection).with_sort(sort)
    }

    /// An unsorted connection field with a `where` argument.
    pub fn filtered(
        name: impl Into<String>,
        connection: ConnectionType,
        shapes: &FilterShapeCache,
    ) -> Result<Self> {
        Self::unsorted(name, connection).with_where(shapes)
    }

    /// Set the sort argument.
    ///
    /// `SortOption::Auto` needs a backing entity; connections over other
    /// node types must pass `SortOption::Disabled` or an explicit enum.
    pub fn with_sort(mut self, sort: SortOption) -> Result<Self> {
        self.sort = match sort {
            SortOption::Auto => match self.connection.entity {
                Some(entity) => Some(SortEnum::for_entity(entity)),
                None => {
                    return Err(Error::SortArgumentConstruction {
                        type_name: self.connection.name.clone(),
                    });
                }
            },
            SortOption::Disabled => None,
            SortOption::Explicit(sort_enum) => Some(sort_enum),
        };
        Ok(self)
    }

    /// Add the `where` argument for the backing entity.
    pub fn with_where(mut self, shapes: &FilterShapeCache) -> Result<Self> {
        let entity = self.entity()?;
        self.where_shape = Some(shapes.argument_for(entity));
        Ok(self)
    }

    /// Declare filter keys every call must supply.
    pub fn required<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&P, &ResolveArgs) -> ResolverOutcome<T> + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_scope<F>(mut self, scope: F) -> Self
    where
        F: Fn(&P) -> Option<Predicate> + Send + Sync + 'static,
    {
        self.scope = Some(Arc::new(scope));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &ConnectionType {
        &self.connection
    }

    pub fn sort_enum(&self) -> Option<&SortEnum> {
        self.sort.as_ref()
    }

    pub fn where_shape(&self) -> Option<&FilterArgumentShape> {
        self.where_shape.as_deref()
    }

    pub fn required_filters(&self) -> &BTreeSet<String> {
        &self.required
    }

    fn entity(&self) -> Result<&'static EntityMeta> {
        self.connection
            .entity
            .ok_or_else(|| Error::UnknownEntity(self.connection.node.clone()))
    }

    /// Parse a raw argument map for this field.
    pub fn parse_args(&self, registry: Option<&Registry>, raw: &Value) -> Result<ResolveArgs> {
        match self.connection.entity {
            Some(entity) => ResolveArgs::from_json(entity, self.sort.as_ref(), registry, raw),
            None => {
                let page = match raw.as_object() {
                    Some(map) => ConnectionArgs::from_json(map)?,
                    None => ConnectionArgs::default(),
                };
                Ok(ResolveArgs::new().page(page))
            }
        }
    }

    /// Fail with the exact set of required keys the caller left out.
    pub fn check_required(&self, args: &ResolveArgs) -> Result<()> {
        if self.required.is_empty() {
            return Ok(());
        }
        let supplied = args.filter_keys();
        let missing: BTreeSet<String> = self
            .required
            .iter()
            .filter(|key| !supplied.contains(&key.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingRequiredFilter(missing))
        }
    }

    /// Resolve the field for `parent`.
    ///
    /// Omitted sorts fall back to the sort enum's default. The custom
    /// resolver, when set, runs before any query is built.
    pub fn resolve(
        &self,
        parent: &P,
        db: &Database,
        mut args: ResolveArgs,
    ) -> Result<ConnectionResolution<T>>
    where
        T: FromSqlRow + Clone + Send + 'static,
    {
        self.check_required(&args)?;

        if args.sort.is_none() {
            args.sort = self.sort.as_ref().and_then(SortEnum::default_argument);
        }
        if let Some(predicate) = self.scope.as_ref().and_then(|scope| scope(parent)) {
            args.scope.push(predicate);
        }

        let outcome = match &self.resolver {
            Some(resolver) => resolver(parent, &args),
            None => ResolverOutcome::Defer,
        };
        tracing::debug!(field = %self.name, outcome = ?outcome, "Resolving connection");

        connection_resolver(&self.connection, db, args, outcome)
    }
}

/// Connection field for a relationship of a schema-generated entity.
///
/// The field is unsorted and scoped to rows whose `remote_column` equals
/// the parent's `local_column`.
pub fn default_connection_field_factory(
    relation: &'static RelationDef,
    registry: &Registry,
) -> Result<ConnectionField<Record, Record>> {
    let connection = registry.connection_type(relation.target)?;
    Ok(
        ConnectionField::unsorted(relation.name, connection).with_scope(move |parent: &Record| {
            let value = parent
                .get(relation.local_column)
                .cloned()
                .unwrap_or(SqlValue::Null);
            Some(Predicate::eq(relation.remote_column, value))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{ComparisonOperator, FilterNode};
    use crate::orm::{ColumnDef, ScalarType};
    use assert_matches::assert_matches;

    static ARTICLE: EntityMeta = EntityMeta {
        name: "Article",
        plural: "Articles",
        table: "articles",
        primary_key: "id",
        columns: &[
            ColumnDef::new("id", ScalarType::Int).primary_key(),
            ColumnDef::new("headline", ScalarType::String),
            ColumnDef::new("reporter_id", ScalarType::Int),
        ],
        relations: &[],
    };

    static REPORTER: EntityMeta = EntityMeta {
        name: "Reporter",
        plural: "Reporters",
        table: "reporters",
        primary_key: "id",
        columns: &[ColumnDef::new("id", ScalarType::Int).primary_key()],
        relations: &[RelationDef {
            name: "articles",
            target: "Article",
            local_column: "id",
            remote_column: "reporter_id",
            multiple: true,
        }],
    };

    fn article_connection() -> ConnectionType {
        let mut registry = Registry::new();
        registry.register_entity(&ARTICLE).unwrap();
        registry.connection_type("Article").unwrap()
    }

    #[test]
    fn test_auto_sort_derives_from_entity() {
        let field = ConnectionField::<(), Record>::new("articles", article_connection(), SortOption::Auto)
            .unwrap();
        assert_eq!(field.sort_enum().unwrap().name, "ArticleSortEnum");
    }

    #[test]
    fn test_auto_sort_without_entity_names_type() {
        let err = ConnectionField::<(), Record>::new(
            "tags",
            ConnectionType::for_node("Tag"),
            SortOption::Auto,
        )
        .unwrap_err();
        assert_matches!(err, Error::SortArgumentConstruction { type_name } if type_name == "TagConnection");

        let field = ConnectionField::<(), Record>::new(
            "tags",
            ConnectionType::for_node("Tag"),
            SortOption::Disabled,
        )
        .unwrap();
        assert!(field.sort_enum().is_none());
    }

    #[test]
    fn test_filtered_field_uses_entity_shape() {
        let shapes = FilterShapeCache::new();
        let field =
            ConnectionField::<(), Record>::filtered("articles", article_connection(), &shapes).unwrap();
        assert_eq!(field.where_shape().unwrap().name, "ArticleFilter");
        assert!(field.sort_enum().is_none());
    }

    #[test]
    fn test_missing_required_filter_reports_exact_keys() {
        let field = ConnectionField::<(), Record>::unsorted("articles", article_connection())
            .required(["reporter_id"]);

        let args = ResolveArgs::new()
            .where_filter(FilterNode::new().field("headline", ComparisonOperator::Equal, "X"));
        assert_matches!(
            field.check_required(&args),
            Err(Error::MissingRequiredFilter(keys)) if keys.iter().collect::<Vec<_>>() == vec!["reporter_id"]
        );

        let args = ResolveArgs::new()
            .filter(FilterNode::new().field("reporter_id", ComparisonOperator::Equal, 7i64));
        assert!(field.check_required(&args).is_ok());
    }

    #[test]
    fn test_factory_scopes_by_parent_column() {
        let mut registry = Registry::new();
        registry.register_entity(&ARTICLE).unwrap();
        registry.register_entity(&REPORTER).unwrap();

        let field = default_connection_field_factory(&REPORTER.relations[0], &registry).unwrap();
        assert_eq!(field.name(), "articles");
        assert_eq!(field.connection().name, "ArticleConnection");
        assert!(field.sort_enum().is_none());

        let parent = Record::new().with("id", 4i64);
        let scope = field.scope.as_ref().unwrap();
        assert_eq!(scope(&parent), Some(Predicate::eq("reporter_id", 4i64)));
    }
}
