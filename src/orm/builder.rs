//! SQL Query Builder for the ORM layer
//!
//! Builds parameterized SELECT / COUNT statements for an [`EntityMeta`]
//! from compiled predicates and sort specs. Nothing runs until one of the
//! `fetch_*`/`count` methods is awaited, and every builder method returns a
//! new handle so a query can be re-composed (e.g. counted, then sliced).

use std::marker::PhantomData;

use sqlx::SqlitePool;

use crate::filters::Predicate;
use crate::sort::SortSpec;

use super::traits::{EntityMeta, FromSqlRow, SqlValue, quote_ident};

/// A lazy query over one entity.
pub struct EntityQuery<E> {
    entity: &'static EntityMeta,
    predicates: Vec<Predicate>,
    order_by: Vec<SortSpec>,
    limit: Option<i64>,
    offset: Option<i64>,
    _phantom: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityQuery<E> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            predicates: self.predicates.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            _phantom: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for EntityQuery<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityQuery")
            .field("entity", &self.entity.name)
            .field("predicates", &self.predicates)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<E> EntityQuery<E> {
    /// Create a new query builder for the entity.
    pub fn new(entity: &'static EntityMeta) -> Self {
        Self {
            entity,
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _phantom: PhantomData,
        }
    }

    pub fn entity(&self) -> &'static EntityMeta {
        self.entity
    }

    /// AND a predicate onto the query. Neutral predicates are ignored.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        if !predicate.is_neutral() {
            self.predicates.push(predicate);
        }
        self
    }

    /// AND a `column = value` condition onto the query.
    pub fn where_eq(self, column: &str, value: SqlValue) -> Self {
        self.filter(Predicate::eq(column, value))
    }

    /// Append ORDER BY terms, left to right.
    pub fn order_by(mut self, specs: &[SortSpec]) -> Self {
        self.order_by.extend(specs.iter().cloned());
        self
    }

    pub fn order_clauses(&self) -> &[SortSpec] {
        &self.order_by
    }

    /// Set limit directly.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set offset directly.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn where_sql(&self, binds: &mut Vec<SqlValue>) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        let conditions: Vec<String> = self.predicates.iter().map(|p| p.to_sql(binds)).collect();
        format!(" WHERE {}", conditions.join(" AND "))
    }

    /// Build the SQL query string and its bind values.
    pub fn build_sql(&self) -> (String, Vec<SqlValue>) {
        let mut binds = Vec::new();
        let mut sql = self.entity.select_sql();
        sql.push_str(&self.where_sql(&mut binds));

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self.order_by.iter().map(SortSpec::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(&format!(" LIMIT {}", limit));
                if let Some(offset) = offset.filter(|o| *o > 0) {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
            }
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
            }
            _ => {}
        }

        (sql, binds)
    }

    /// Build a COUNT query string (ignores ordering and slicing).
    pub fn build_count_sql(&self) -> (String, Vec<SqlValue>) {
        let mut binds = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(self.entity.table));
        sql.push_str(&self.where_sql(&mut binds));
        (sql, binds)
    }

    /// Execute a COUNT query.
    pub async fn count(&self, pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let (sql, binds) = self.build_count_sql();
        tracing::debug!(sql = %sql, "Executing count query");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &binds {
            query = value.bind_to_scalar(query);
        }

        query.fetch_one(pool).await
    }
}

impl<E: FromSqlRow> EntityQuery<E> {
    /// Execute the query and return all matching entities.
    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<E>, sqlx::Error> {
        let (sql, binds) = self.build_sql();
        tracing::debug!(sql = %sql, "Executing entity query");

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = value.bind_to_query(query);
        }

        let rows = query.fetch_all(pool).await?;
        rows.iter().map(E::from_row).collect()
    }

    /// Execute the query and return the first entity, if any.
    pub async fn fetch_optional(&self, pool: &SqlitePool) -> Result<Option<E>, sqlx::Error> {
        let results = self.clone().limit(1).fetch_all(pool).await?;
        Ok(results.into_iter().next())
    }
}
