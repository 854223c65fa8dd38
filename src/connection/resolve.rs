//! Connection resolution
//!
//! A custom resolver either defers to the default query, hands back a
//! finished collection, or hands back a future of one. Finished
//! collections are paginated inline; everything else is chained onto a
//! single boxed future, so pagination only ever sees resolved values.

use std::collections::HashSet;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::SqlitePool;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::orm::{EntityMeta, EntityQuery, FromSqlRow};
use crate::pagination::{
    Connection, ConnectionArgs, Resolved, build_page, connection_from_items, slice_bounds,
};
use crate::registry::ConnectionType;
use crate::sort::SortSpec;

use super::args::ResolveArgs;
use super::query::build_query;

/// What a custom connection resolver produced.
pub enum ResolverOutcome<T> {
    /// Fall back to querying the backing entity
    Defer,
    Ready(Vec<T>),
    /// Resolves to `None` to defer, like [`ResolverOutcome::Defer`]
    Pending(BoxFuture<'static, Result<Option<Vec<T>>>>),
}

impl<T> ResolverOutcome<T> {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Option<Vec<T>>>> + Send + 'static,
    {
        ResolverOutcome::Pending(future.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ResolverOutcome::Pending(_))
    }
}

impl<T> From<Vec<T>> for ResolverOutcome<T> {
    fn from(items: Vec<T>) -> Self {
        ResolverOutcome::Ready(items)
    }
}

/// Sets carry no order, so the resulting sequence is in iteration order.
impl<T> From<HashSet<T>> for ResolverOutcome<T> {
    fn from(items: HashSet<T>) -> Self {
        ResolverOutcome::Ready(items.into_iter().collect())
    }
}

impl<T> From<Option<Vec<T>>> for ResolverOutcome<T> {
    fn from(items: Option<Vec<T>>) -> Self {
        match items {
            Some(items) => ResolverOutcome::Ready(items),
            None => ResolverOutcome::Defer,
        }
    }
}

impl<T> std::fmt::Debug for ResolverOutcome<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolverOutcome::Defer => f.write_str("Defer"),
            ResolverOutcome::Ready(items) => write!(f, "Ready({} items)", items.len()),
            ResolverOutcome::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A connection that is either finished or still waiting on I/O.
pub enum ConnectionResolution<T> {
    Ready(Connection<T>),
    Pending(BoxFuture<'static, Result<Connection<T>>>),
}

impl<T> ConnectionResolution<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionResolution::Ready(_))
    }

    pub async fn into_connection(self) -> Result<Connection<T>> {
        match self {
            ConnectionResolution::Ready(connection) => Ok(connection),
            ConnectionResolution::Pending(future) => future.await,
        }
    }
}

/// Paginate `resolved`, or the query built from `args` when it is `None`.
pub async fn resolve_connection<T>(
    entity: &'static EntityMeta,
    pool: &SqlitePool,
    args: &ResolveArgs,
    resolved: Option<Vec<T>>,
) -> Result<Connection<T>>
where
    T: FromSqlRow + Clone,
{
    match resolved {
        Some(items) => connection_from_items(items, &args.page),
        None => {
            let query = build_query(entity, pool, args).await?;
            paginate_query(query, pool, &args.page).await
        }
    }
}

/// Count the query, then fetch only the requested page.
///
/// Unordered queries are ordered by primary key so offset cursors stay
/// stable between requests.
pub async fn paginate_query<T>(
    mut query: EntityQuery<T>,
    pool: &SqlitePool,
    page: &ConnectionArgs,
) -> Result<Connection<T>>
where
    T: FromSqlRow,
{
    if query.order_clauses().is_empty() {
        let primary_key = query.entity().primary_key;
        query = query.order_by(&[SortSpec::asc(primary_key)]);
    }

    let length = usize::try_from(query.count(pool).await?).unwrap_or_default();
    let bounds = slice_bounds(page, length)?;

    let nodes = if bounds.is_empty() {
        Vec::new()
    } else {
        query
            .clone()
            .offset(bounds.start as i64)
            .limit(bounds.len() as i64)
            .fetch_all(pool)
            .await?
    };

    let (edges, page_info) = build_page(nodes, &bounds);
    Ok(Connection {
        edges,
        page_info,
        iterable: Resolved::Query(query),
        length,
    })
}

/// Continue resolution from a custom resolver's outcome.
///
/// `Ready` outcomes are paginated before returning; the others come back as
/// a pending resolution.
pub fn connection_resolver<T>(
    connection: &ConnectionType,
    db: &Database,
    args: ResolveArgs,
    outcome: ResolverOutcome<T>,
) -> Result<ConnectionResolution<T>>
where
    T: FromSqlRow + Clone + Send + 'static,
{
    let entity = connection.entity;
    let node = connection.node.clone();
    let pool = db.pool().clone();

    match outcome {
        ResolverOutcome::Ready(items) => Ok(ConnectionResolution::Ready(connection_from_items(
            items,
            &args.page,
        )?)),
        ResolverOutcome::Defer => {
            let entity = entity.ok_or(Error::UnknownEntity(node))?;
            Ok(ConnectionResolution::Pending(
                async move { resolve_connection(entity, &pool, &args, None).await }.boxed(),
            ))
        }
        ResolverOutcome::Pending(future) => Ok(ConnectionResolution::Pending(
            async move {
                match future.await? {
                    Some(items) => connection_from_items(items, &args.page),
                    None => {
                        let entity = entity.ok_or(Error::UnknownEntity(node))?;
                        resolve_connection(entity, &pool, &args, None).await
                    }
                }
            }
            .boxed(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::Record;
    use assert_matches::assert_matches;

    #[test]
    fn test_outcome_conversions() {
        let set: HashSet<i64> = [1, 2, 3].into_iter().collect();
        assert_matches!(ResolverOutcome::from(set), ResolverOutcome::Ready(items) if items.len() == 3);
        assert_matches!(ResolverOutcome::<i64>::from(None), ResolverOutcome::Defer);
        assert_matches!(ResolverOutcome::from(Some(vec![1i64])), ResolverOutcome::Ready(_));
        assert!(ResolverOutcome::<i64>::pending(async { Ok(None) }).is_pending());
    }

    #[tokio::test]
    async fn test_ready_outcome_is_paginated_inline() {
        let db = Database::connect(&crate::Config::default()).await.unwrap();
        let items = vec![Record::new().with("id", 1i64), Record::new().with("id", 2i64)];

        let resolution = connection_resolver(
            &ConnectionType::for_node("Tag"),
            &db,
            ResolveArgs::new(),
            ResolverOutcome::Ready(items),
        )
        .unwrap();
        assert!(resolution.is_ready());
        assert_eq!(resolution.into_connection().await.unwrap().length, 2);
    }

    #[tokio::test]
    async fn test_defer_without_entity_fails() {
        let db = Database::connect(&crate::Config::default()).await.unwrap();
        let err = connection_resolver::<Record>(
            &ConnectionType::for_node("Tag"),
            &db,
            ResolveArgs::new(),
            ResolverOutcome::Defer,
        )
        .err()
        .unwrap();
        assert_matches!(err, Error::UnknownEntity(node) if node == "Tag");
    }
}
