//! Database session handling
//!
//! The connection pool is the per-request session. It is placed in schema
//! data by the embedding service and fetched back by resolvers; nothing in
//! this crate begins, commits or closes transactions.

use std::str::FromStr;

use anyhow::Context as _;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::orm::EntityMeta;

/// Database wrapper providing connection pool access
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new database connection pool
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("Invalid DATABASE_URL: {}", config.database_url))?
            .create_if_missing(true);

        // Every connection to an in-memory database opens a separate database
        let max_connections = if is_in_memory(&config.database_url) {
            1
        } else {
            config.database_max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        tracing::info!(url = %config.database_url, max_connections, "Database connected");
        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the tables of the given entities if they don't exist yet.
    pub async fn create_tables(&self, entities: &[&EntityMeta]) -> Result<()> {
        for entity in entities {
            let sql = entity.create_table_sql();
            tracing::debug!(table = entity.table, sql = %sql, "Creating table");
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Fetch the session from a resolver context.
pub fn get_session<'a>(ctx: &'a async_graphql::Context<'_>) -> Result<&'a Database> {
    ctx.data_opt::<Database>().ok_or(Error::MissingSession)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{ColumnDef, ScalarType};

    static TAG: EntityMeta = EntityMeta {
        name: "Tag",
        plural: "Tags",
        table: "tags",
        primary_key: "id",
        columns: &[
            ColumnDef::new("id", ScalarType::Int).primary_key(),
            ColumnDef::new("label", ScalarType::String),
        ],
        relations: &[],
    };

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite:file:test?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://data/app.db"));
    }

    #[tokio::test]
    async fn test_connect_in_memory_and_create_tables() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        let db = Database::connect(&config).await.unwrap();
        db.create_tables(&[&TAG]).await.unwrap();

        sqlx::query("INSERT INTO tags (id, label) VALUES (1, 'rust')")
            .execute(db.pool())
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
