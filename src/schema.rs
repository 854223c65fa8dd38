//! GraphQL schema generation
//!
//! Builds an `async_graphql` dynamic schema from a [`Registry`]: one object
//! type per entity, connection/edge types, sort enums and filter inputs,
//! and an `all{Plural}` connection field per entity on the query root.

use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, ResolverContext, Scalar, Schema, TypeRef,
};
use async_graphql::{Name, Value as GqlValue};

use crate::connection::{ConnectionField, SortOption, default_connection_field_factory};
use crate::db::{Database, get_session};
use crate::error::{Error, Result};
use crate::filters::shape::is_valid_field_name;
use crate::filters::{Connective, FilterArgumentShape, FilterFieldShape, FilterShapeCache};
use crate::node::{node_from_id, node_id};
use crate::orm::{ColumnDef, EntityMeta, EntityQuery, Record, RelationDef, ScalarType, SqlValue};
use crate::pagination::{Connection, Edge, PageInfo};
use crate::registry::{ConnectionType, EntityType, Registry};
use crate::sort::SortEnum;

const CUSTOM_SCALARS: [&str; 3] = ["UUID", "DateTime", "JSON"];

const NODE_INTERFACE: &str = "Node";

pub struct SchemaBuilder {
    registry: Arc<Registry>,
    shapes: Arc<FilterShapeCache>,
    database: Option<Database>,
}

impl SchemaBuilder {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            shapes: Arc::new(FilterShapeCache::new()),
            database: None,
        }
    }

    /// Share a filter shape cache with other schema builds.
    pub fn shapes(mut self, shapes: Arc<FilterShapeCache>) -> Self {
        self.shapes = shapes;
        self
    }

    /// Session made available to resolvers.
    pub fn data(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn build(self) -> Result<Schema> {
        let mut schema = Schema::build("Query", None, None);
        let mut query = Object::new("Query");

        for name in CUSTOM_SCALARS {
            schema = schema.register(Scalar::new(name));
        }
        schema = schema.register(page_info_type());

        if self.registry.types().any(|ty| ty.node) {
            schema = schema.register(node_interface());
        }

        let mut entities = 0usize;
        for ty in self.registry.types() {
            let sort = self.sort_option(ty.meta);
            if let SortOption::Explicit(sort_enum) = &sort {
                schema = schema.register(sort_enum_type(sort_enum));
            }
            schema = schema.register(filter_input(&self.shapes.argument_for(ty.meta)));
            schema = schema.register(self.entity_object(ty)?);
            schema = schema.register(edge_type(ty));
            schema = schema.register(connection_type(ty));

            let field = ConnectionField::<(), Record>::filtered(
                ty.all_field_name(),
                ConnectionType::for_entity(ty),
                &self.shapes,
            )?
            .with_sort(sort)?;
            query = query.field(connection_field(field, self.registry.clone(), root_parent));
            if ty.node {
                query = query.field(node_lookup_field(ty));
            }
            entities += 1;
        }

        // Operator shapes are created while building the entity filters
        for shape in self.shapes.field_shapes() {
            schema = schema.register(operator_input(&shape));
        }

        schema = schema.register(query);
        if let Some(database) = self.database {
            schema = schema.data(database);
        }

        let schema = schema.finish().map_err(|e| Error::Schema(e.to_string()))?;
        tracing::info!(entities, "Built GraphQL schema");
        Ok(schema)
    }

    /// Sort enums without values cannot be expressed in GraphQL, so those
    /// entities get no sort argument.
    fn sort_option(&self, entity: &EntityMeta) -> SortOption {
        let sort_enum = self.registry.sort_enum_for(entity);
        if sort_enum.values.is_empty() {
            SortOption::Disabled
        } else {
            SortOption::Explicit(sort_enum)
        }
    }

    fn entity_object(&self, ty: &EntityType) -> Result<Object> {
        let mut object = Object::new(ty.name.clone());
        if let Some(description) = &ty.description {
            object = object.description(description.clone());
        }

        if ty.node {
            object = object.implement(NODE_INTERFACE).field(node_id_field(ty.meta));
        }

        let columns = ty
            .meta
            .columns
            .iter()
            .filter(|c| is_valid_field_name(c.name) && ty.includes_field(c.name))
            .filter(|c| !(ty.node && c.name == "id"));
        for column in columns {
            object = object.field(column_field(column));
        }

        for relation in ty.meta.relations.iter().filter(|r| ty.includes_field(r.name)) {
            let Some(target) = self.registry.type_for_entity(relation.target) else {
                tracing::debug!(
                    entity = ty.meta.name,
                    relation = relation.name,
                    target = relation.target,
                    "Skipping relation to unregistered entity"
                );
                continue;
            };

            object = object.field(if relation.multiple {
                // Custom factories decide the field's arguments themselves
                let field = if ty.has_custom_connection_factory() {
                    ty.relation_connection(relation, &self.registry)?
                } else {
                    default_connection_field_factory(relation, &self.registry)?
                        .with_sort(self.sort_option(target.meta))?
                        .with_where(&self.shapes)?
                };
                connection_field(field, self.registry.clone(), record_parent)
            } else {
                single_relation_field(relation, target.meta, target.name.clone())
            });
        }

        Ok(object)
    }
}

fn root_parent(_ctx: &ResolverContext<'_>) -> async_graphql::Result<()> {
    Ok(())
}

fn record_parent(ctx: &ResolverContext<'_>) -> async_graphql::Result<Record> {
    ctx.parent_value.try_downcast_ref::<Record>().cloned()
}

/// Expose a connection field with its sort, `where` and pagination arguments.
fn connection_field<P>(
    field: ConnectionField<P, Record>,
    registry: Arc<Registry>,
    parent: fn(&ResolverContext<'_>) -> async_graphql::Result<P>,
) -> Field
where
    P: Send + Sync + 'static,
{
    let field = Arc::new(field);
    let resolver_field = field.clone();

    let mut gql_field = Field::new(
        field.name().to_string(),
        TypeRef::named_nn(field.connection().name.clone()),
        move |ctx| {
            let field = resolver_field.clone();
            let registry = registry.clone();
            FieldFuture::new(async move {
                let parent = parent(&ctx)?;
                let db = get_session(ctx.ctx)?;
                let raw = arguments_json(&ctx)?;
                let args = field.parse_args(Some(&registry), &raw)?;
                let connection = field.resolve(&parent, db, args)?.into_connection().await?;
                Ok(Some(FieldValue::owned_any(connection)))
            })
        },
    );

    if let Some(sort) = field.sort_enum() {
        gql_field = gql_field.argument(
            InputValue::new("sort", TypeRef::named_nn_list(sort.name.clone()))
                .default_value(sort_default(sort)),
        );
    }
    if let Some(shape) = field.where_shape() {
        gql_field = gql_field.argument(InputValue::new("where", TypeRef::named(shape.name.clone())));
    }

    gql_field
        .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
        .argument(InputValue::new("last", TypeRef::named(TypeRef::INT)))
        .argument(InputValue::new("after", TypeRef::named(TypeRef::STRING)))
        .argument(InputValue::new("before", TypeRef::named(TypeRef::STRING)))
}

fn sort_default(sort: &SortEnum) -> GqlValue {
    GqlValue::List(
        sort.default
            .iter()
            .map(|name| GqlValue::Enum(Name::new(name)))
            .collect(),
    )
}

/// Nullable object field for a many-to-one relation.
fn single_relation_field(
    relation: &'static RelationDef,
    target: &'static EntityMeta,
    type_name: String,
) -> Field {
    Field::new(relation.name, TypeRef::named(type_name), move |ctx| {
        FieldFuture::new(async move {
            let record = ctx.parent_value.try_downcast_ref::<Record>()?;
            let value = match record.get(relation.local_column) {
                Some(value) if !value.is_null() => value.clone(),
                _ => return Ok(None),
            };

            let db = get_session(ctx.ctx)?;
            let row = EntityQuery::<Record>::new(target)
                .where_eq(relation.remote_column, value)
                .fetch_optional(db.pool())
                .await?;
            Ok(row.map(FieldValue::owned_any))
        })
    })
}

fn column_field(column: &'static ColumnDef) -> Field {
    let scalar = column.scalar.graphql_name();
    let type_ref = if column.nullable {
        TypeRef::named(scalar)
    } else {
        TypeRef::named_nn(scalar)
    };

    Field::new(column.name, type_ref, move |ctx| {
        FieldFuture::new(async move {
            let record = ctx.parent_value.try_downcast_ref::<Record>()?;
            Ok(record
                .get(column.name)
                .and_then(|value| to_graphql_value(value, column.scalar))
                .map(FieldValue::value))
        })
    })
}

/// Convert a stored value to its GraphQL output form.
pub fn to_graphql_value(value: &SqlValue, scalar: ScalarType) -> Option<GqlValue> {
    match (scalar, value) {
        (_, SqlValue::Null) => None,
        (ScalarType::Boolean, SqlValue::Int(i)) => Some(GqlValue::Boolean(*i != 0)),
        (ScalarType::Json, SqlValue::String(text)) => Some(
            serde_json::from_str(text)
                .ok()
                .and_then(|json| GqlValue::from_json(json).ok())
                .unwrap_or_else(|| GqlValue::String(text.clone())),
        ),
        (_, value) => GqlValue::from_json(value.to_json()).ok(),
    }
}

fn page_info_type() -> Object {
    fn page_info<'a>(ctx: &ResolverContext<'a>) -> async_graphql::Result<&'a PageInfo> {
        ctx.parent_value.try_downcast_ref::<PageInfo>()
    }

    Object::new("PageInfo")
        .field(Field::new(
            "hasNextPage",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |ctx| {
                FieldFuture::new(async move {
                    let info = page_info(&ctx)?;
                    Ok(Some(FieldValue::value(info.has_next_page)))
                })
            },
        ))
        .field(Field::new(
            "hasPreviousPage",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |ctx| {
                FieldFuture::new(async move {
                    let info = page_info(&ctx)?;
                    Ok(Some(FieldValue::value(info.has_previous_page)))
                })
            },
        ))
        .field(Field::new(
            "startCursor",
            TypeRef::named(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let info = page_info(&ctx)?;
                    Ok(info.start_cursor.clone().map(FieldValue::value))
                })
            },
        ))
        .field(Field::new(
            "endCursor",
            TypeRef::named(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let info = page_info(&ctx)?;
                    Ok(info.end_cursor.clone().map(FieldValue::value))
                })
            },
        ))
}

fn edge_type(ty: &EntityType) -> Object {
    Object::new(ty.edge_name())
        .field(Field::new("node", TypeRef::named_nn(ty.name.clone()), |ctx| {
            FieldFuture::new(async move {
                let edge = ctx.parent_value.try_downcast_ref::<Edge<Record>>()?;
                Ok(Some(FieldValue::owned_any(edge.node.clone())))
            })
        }))
        .field(Field::new("cursor", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move {
                let edge = ctx.parent_value.try_downcast_ref::<Edge<Record>>()?;
                Ok(Some(FieldValue::value(edge.cursor.clone())))
            })
        }))
}

fn connection_type(ty: &EntityType) -> Object {
    Object::new(ty.connection_name())
        .field(Field::new(
            "edges",
            TypeRef::named_nn_list_nn(ty.edge_name()),
            |ctx| {
                FieldFuture::new(async move {
                    let connection = ctx.parent_value.try_downcast_ref::<Connection<Record>>()?;
                    Ok(Some(FieldValue::list(
                        connection.edges.iter().cloned().map(FieldValue::owned_any),
                    )))
                })
            },
        ))
        .field(Field::new("pageInfo", TypeRef::named_nn("PageInfo"), |ctx| {
            FieldFuture::new(async move {
                let connection = ctx.parent_value.try_downcast_ref::<Connection<Record>>()?;
                Ok(Some(FieldValue::owned_any(connection.page_info.clone())))
            })
        }))
        .field(Field::new("totalCount", TypeRef::named_nn(TypeRef::INT), |ctx| {
            FieldFuture::new(async move {
                let connection = ctx.parent_value.try_downcast_ref::<Connection<Record>>()?;
                Ok(Some(FieldValue::value(total_count(connection.length)?)))
            })
        }))
}

/// `totalCount` as a GraphQL `Int`.
fn total_count(length: usize) -> async_graphql::Result<i32> {
    i32::try_from(length)
        .map_err(|_| async_graphql::Error::new(format!("totalCount {} does not fit in Int", length)))
}

fn node_interface() -> Interface {
    Interface::new(NODE_INTERFACE)
        .description("An object with an ID")
        .field(InterfaceField::new("id", TypeRef::named_nn(TypeRef::ID)))
}

/// The `id` field of a node type, holding the primary key value.
fn node_id_field(entity: &'static EntityMeta) -> Field {
    Field::new("id", TypeRef::named_nn(TypeRef::ID), move |ctx| {
        FieldFuture::new(async move {
            let record = ctx.parent_value.try_downcast_ref::<Record>()?;
            Ok(node_id(entity, record).map(|id| FieldValue::value(GqlValue::String(id))))
        })
    })
}

/// Root field fetching one node by id, e.g. `article(id: "3")`.
fn node_lookup_field(ty: &EntityType) -> Field {
    let entity = ty.meta;
    Field::new(ty.node_field_name(), TypeRef::named(ty.name.clone()), move |ctx| {
        FieldFuture::new(async move {
            let id = ctx.args.try_get("id")?.string()?.to_string();
            let db = get_session(ctx.ctx)?;
            let record = node_from_id(entity, db.pool(), &id).await?;
            Ok(record.map(FieldValue::owned_any))
        })
    })
    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)))
}

fn sort_enum_type(sort: &SortEnum) -> Enum {
    Enum::new(sort.name.clone()).items(sort.values.iter().map(|v| EnumItem::new(v.name.clone())))
}

/// `{Entity}Filter` input object. Columns spelled like a combinator key are
/// left out, since the combinator takes that input field.
fn filter_input(shape: &FilterArgumentShape) -> InputObject {
    let mut input = InputObject::new(shape.name.clone());
    for (column, field_shape) in &shape.fields {
        if Connective::from_key(column).is_some() {
            continue;
        }
        input = input.field(InputValue::new(*column, TypeRef::named(field_shape.name.clone())));
    }
    for key in FilterArgumentShape::COMBINATORS {
        input = input.field(InputValue::new(key, TypeRef::named(shape.name.clone())));
    }
    input
}

/// `{Scalar}Filter` input object with one field per operator.
fn operator_input(shape: &FilterFieldShape) -> InputObject {
    let scalar = shape.scalar.graphql_name();
    shape
        .operators
        .iter()
        .fold(InputObject::new(shape.name.clone()), |input, (tag, takes_list)| {
            let type_ref = if *takes_list {
                TypeRef::named_nn_list(scalar)
            } else {
                TypeRef::named(scalar)
            };
            input.field(InputValue::new(*tag, type_ref))
        })
}

/// Field arguments as JSON, with unset filter fields removed.
fn arguments_json(ctx: &ResolverContext<'_>) -> async_graphql::Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (name, value) in ctx.args.as_index_map() {
        let mut json = value.clone().into_json()?;
        if matches!(name.as_str(), "where" | "filter") {
            prune_filter_nulls(&mut json);
        }
        map.insert(name.to_string(), json);
    }
    Ok(serde_json::Value::Object(map))
}

/// Drop null-valued keys from a filter node and its nested combinators.
/// Operator mappings are left alone, so `{equal: null}` keeps its meaning.
fn prune_filter_nulls(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        map.retain(|_, v| !v.is_null());
        for (key, nested) in map.iter_mut() {
            if Connective::from_key(key).is_some() {
                prune_filter_nulls(nested);
            }
        }
    }
}
