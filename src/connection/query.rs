//! Query construction for connection fields

use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::filters::{Predicate, compile};
use crate::orm::{EntityMeta, EntityQuery, Record, SqlValue};

use super::args::{RelationFilter, ResolveArgs};

/// Build the lazy query a connection over `entity` paginates.
///
/// Applies, in order: the field's own scope, relationship filters, the
/// legacy `filter` and `where` filters, then the sort. Relationship filters
/// are resolved eagerly against `pool`; nothing else executes.
pub async fn build_query<T>(
    entity: &'static EntityMeta,
    pool: &SqlitePool,
    args: &ResolveArgs,
) -> Result<EntityQuery<T>> {
    let mut query = EntityQuery::new(entity);

    for predicate in &args.scope {
        query = query.filter(predicate.clone());
    }

    for relation in &args.relations {
        query = query.filter(correlate(pool, relation).await?);
    }

    if let Some(filter) = &args.filter {
        query = query.filter(compile(entity, filter)?);
    }

    if let Some(where_) = &args.where_ {
        query = query.filter(compile(entity, where_)?);
    }

    if let Some(sort) = &args.sort {
        query = query.order_by(sort.specs());
    }

    Ok(query)
}

/// Look up the single related row and constrain the local column to it.
async fn correlate(pool: &SqlitePool, filter: &RelationFilter) -> Result<Predicate> {
    let target = filter.target;
    let relation = filter.relation;

    // Two rows are enough to tell "exactly one" from "several"
    let rows = EntityQuery::<Record>::new(target)
        .filter(compile(target, &filter.filter)?)
        .limit(2)
        .fetch_all(pool)
        .await?;

    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => {
            let value = row
                .get(relation.remote_column)
                .cloned()
                .unwrap_or(SqlValue::Null);
            Ok(Predicate::eq(relation.local_column, value))
        }
        (None, _) => Err(Error::Database(sqlx::Error::RowNotFound)),
        (Some(_), Some(_)) => Err(Error::MultipleResultsFound {
            entity: target.name.to_string(),
        }),
    }
}
