//! Entity type registry
//!
//! Associates each entity with the schema type generated for it. A registry
//! is an ordinary value owned by whoever builds the schema; tests create a
//! fresh one with [`Registry::new`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::connection::{ConnectionField, ConnectionFieldFactory, default_connection_field_factory};
use crate::error::{Error, Result};
use crate::orm::{EntityMeta, Record, RelationDef};
use crate::sort::SortEnum;

/// The schema type of an entity.
///
/// Besides naming the type, it selects which columns and relations become
/// object fields and how relationship connections are built.
#[derive(Clone)]
pub struct EntityType {
    pub name: String,
    pub meta: &'static EntityMeta,
    pub description: Option<String>,
    /// When non-empty, only these fields are exposed
    pub only_fields: BTreeSet<String>,
    pub exclude_fields: BTreeSet<String>,
    /// Implement the `Node` interface and get a lookup-by-id root field
    pub node: bool,
    connection_factory: Option<ConnectionFieldFactory>,
}

impl std::fmt::Debug for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("entity", &self.meta.name)
            .field("only_fields", &self.only_fields)
            .field("exclude_fields", &self.exclude_fields)
            .field("node", &self.node)
            .field("custom_connection_factory", &self.connection_factory.is_some())
            .finish()
    }
}

impl EntityType {
    /// A type named after the entity.
    pub fn new(meta: &'static EntityMeta) -> Self {
        Self::named(meta.name, meta)
    }

    pub fn named(name: impl Into<String>, meta: &'static EntityMeta) -> Self {
        Self {
            name: name.into(),
            meta,
            description: None,
            only_fields: BTreeSet::new(),
            exclude_fields: BTreeSet::new(),
            node: false,
            connection_factory: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn only_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn exclude_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Exclude columns the store fills in itself: integer primary keys and
    /// timestamps with a default.
    pub fn exclude_autogenerated(self) -> Self {
        let generated = self
            .meta
            .columns
            .iter()
            .filter(|c| c.is_autogenerated())
            .map(|c| c.name);
        self.exclude_fields(generated)
    }

    /// Expose the type through the `Node` interface.
    ///
    /// The node `id` is the primary key value, and it replaces any column
    /// field named `id`.
    pub fn node(mut self) -> Self {
        self.node = true;
        self
    }

    /// Build relationship connections with `factory` instead of
    /// [`default_connection_field_factory`].
    pub fn connection_field_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&'static RelationDef, &Registry) -> Result<ConnectionField<Record, Record>>
            + Send
            + Sync
            + 'static,
    {
        self.connection_factory = Some(Arc::new(factory));
        self
    }

    pub fn has_custom_connection_factory(&self) -> bool {
        self.connection_factory.is_some()
    }

    /// Whether a column or relation named `field` becomes an object field.
    pub fn includes_field(&self, field: &str) -> bool {
        (self.only_fields.is_empty() || self.only_fields.contains(field))
            && !self.exclude_fields.contains(field)
    }

    /// The connection field for one of this type's relationships.
    pub fn relation_connection(
        &self,
        relation: &'static RelationDef,
        registry: &Registry,
    ) -> Result<ConnectionField<Record, Record>> {
        match &self.connection_factory {
            Some(factory) => factory(relation, registry),
            None => default_connection_field_factory(relation, registry),
        }
    }

    pub fn connection_name(&self) -> String {
        format!("{}Connection", self.name)
    }

    pub fn edge_name(&self) -> String {
        format!("{}Edge", self.name)
    }

    /// Root query field name, e.g. `allArticles`.
    pub fn all_field_name(&self) -> String {
        format!("all{}", self.meta.plural)
    }

    /// Root lookup field name for node types, e.g. `article`.
    pub fn node_field_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// A connection type and, when it wraps an entity, the backing entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionType {
    pub name: String,
    /// Node type name
    pub node: String,
    pub entity: Option<&'static EntityMeta>,
}

impl ConnectionType {
    pub fn for_entity(ty: &EntityType) -> Self {
        Self {
            name: ty.connection_name(),
            node: ty.name.clone(),
            entity: Some(ty.meta),
        }
    }

    /// A connection over a node type that has no backing entity.
    pub fn for_node(node: impl Into<String>) -> Self {
        let node = node.into();
        Self {
            name: format!("{}Connection", node),
            node,
            entity: None,
        }
    }

    pub fn edge_name(&self) -> String {
        format!("{}Edge", self.node)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<EntityType>,
    by_entity: HashMap<&'static str, usize>,
    sort_enums: HashMap<&'static str, SortEnum>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a schema type with its entity.
    ///
    /// Registering the same type twice is a no-op; registering a different
    /// type for an entity that already has one fails.
    pub fn register(&mut self, ty: EntityType) -> Result<()> {
        if let Some(&idx) = self.by_entity.get(ty.meta.name) {
            let existing = &self.types[idx];
            if existing.name == ty.name {
                return Ok(());
            }
            return Err(Error::DuplicateEntityType {
                entity: ty.meta.name.to_string(),
                existing: existing.name.clone(),
            });
        }

        tracing::debug!(entity = ty.meta.name, type_name = %ty.name, "Registered entity type");
        self.by_entity.insert(ty.meta.name, self.types.len());
        self.types.push(ty);
        Ok(())
    }

    /// Register an entity under its own name.
    pub fn register_entity(&mut self, meta: &'static EntityMeta) -> Result<()> {
        self.register(EntityType::new(meta))
    }

    pub fn type_for_entity(&self, entity: &str) -> Option<&EntityType> {
        self.by_entity.get(entity).map(|&idx| &self.types[idx])
    }

    pub fn entity_meta(&self, entity: &str) -> Result<&'static EntityMeta> {
        self.type_for_entity(entity)
            .map(|ty| ty.meta)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    /// Registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.iter()
    }

    pub fn connection_type(&self, entity: &str) -> Result<ConnectionType> {
        self.type_for_entity(entity)
            .map(ConnectionType::for_entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    /// Replace the derived sort enum of an entity.
    pub fn register_sort_enum(&mut self, entity: &'static EntityMeta, sort_enum: SortEnum) {
        self.sort_enums.insert(entity.name, sort_enum);
    }

    /// The custom sort enum if one was registered, else the derived one.
    pub fn sort_enum_for(&self, entity: &EntityMeta) -> SortEnum {
        self.sort_enums
            .get(entity.name)
            .cloned()
            .unwrap_or_else(|| SortEnum::for_entity(entity))
    }
}
