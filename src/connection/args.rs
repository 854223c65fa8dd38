//! Per-call resolution arguments

use serde_json::Value;

use crate::error::{Error, Result};
use crate::filters::{FilterNode, Predicate};
use crate::orm::{EntityMeta, RelationDef};
use crate::pagination::ConnectionArgs;
use crate::registry::Registry;
use crate::sort::{SortArgument, SortEnum};

/// Requires the row reachable through `relation` to match `filter`.
///
/// Resolved by looking up exactly one `target` row and constraining
/// `local_column` to its `remote_column` value.
#[derive(Debug, Clone)]
pub struct RelationFilter {
    pub relation: &'static RelationDef,
    pub target: &'static EntityMeta,
    pub filter: FilterNode,
}

/// Arguments of one connection field resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    pub sort: Option<SortArgument>,
    /// The `where` argument
    pub where_: Option<FilterNode>,
    /// Legacy `filter` argument, also used for required-filter checks
    pub filter: Option<FilterNode>,
    pub relations: Vec<RelationFilter>,
    /// Predicates imposed by the field itself, e.g. a relationship join
    pub scope: Vec<Predicate>,
    pub page: ConnectionArgs,
}

impl ResolveArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: SortArgument) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn where_filter(mut self, filter: FilterNode) -> Self {
        self.where_ = Some(filter);
        self
    }

    pub fn filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn relation_filter(mut self, filter: RelationFilter) -> Self {
        self.relations.push(filter);
        self
    }

    pub fn scoped(mut self, predicate: Predicate) -> Self {
        self.scope.push(predicate);
        self
    }

    pub fn page(mut self, page: ConnectionArgs) -> Self {
        self.page = page;
        self
    }

    /// Keys the caller filtered on, for required-filter checks.
    ///
    /// The legacy `filter` argument wins when present; otherwise the
    /// top-level field keys of `where` are used.
    pub fn filter_keys(&self) -> Vec<&str> {
        match (&self.filter, &self.where_) {
            (Some(filter), _) => filter.field_keys(),
            (None, Some(where_)) => where_.field_keys(),
            (None, None) => Vec::new(),
        }
    }

    /// Parse a raw argument map for a connection over `entity`.
    ///
    /// `sort` is only read when `sort_enum` is given. A key naming one of
    /// the entity's relations with an object value becomes a
    /// [`RelationFilter`], which needs `registry` to resolve the target.
    pub fn from_json(
        entity: &'static EntityMeta,
        sort_enum: Option<&SortEnum>,
        registry: Option<&Registry>,
        args: &Value,
    ) -> Result<Self> {
        let map = match args {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => {
                return Err(Error::malformed(
                    "",
                    entity.name,
                    "connection arguments must be an object",
                ));
            }
        };

        let mut resolved = Self {
            page: ConnectionArgs::from_json(map)?,
            ..Self::default()
        };

        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "first" | "last" | "after" | "before" => {}
                "sort" => match sort_enum {
                    Some(sort_enum) => resolved.sort = Some(SortArgument::parse(sort_enum, value)?),
                    None => {
                        tracing::debug!(entity = entity.name, "Ignoring sort on unsorted connection")
                    }
                },
                "where" => resolved.where_ = Some(FilterNode::parse(entity, value)?),
                "filter" => resolved.filter = Some(FilterNode::parse(entity, value)?),
                other => {
                    let Some(relation) = entity.relation(other) else {
                        continue;
                    };
                    if !value.is_object() {
                        continue;
                    }
                    let registry = registry.ok_or_else(|| Error::UnknownEntity(relation.target.to_string()))?;
                    let target = registry.entity_meta(relation.target)?;
                    resolved.relations.push(RelationFilter {
                        relation,
                        target,
                        filter: FilterNode::parse(target, value)?,
                    });
                }
            }
        }

        Ok(resolved)
    }
}
