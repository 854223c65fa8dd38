//! Node lookup by id
//!
//! Node ids are the primary key value rendered as text. Looking one up
//! yields the single matching row, or nothing when the id does not parse
//! or does not identify exactly one row.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::orm::{EntityMeta, EntityQuery, Record, ScalarType, SqlValue};

/// The node id of `record`, if its primary key is set.
pub fn node_id(entity: &EntityMeta, record: &Record) -> Option<String> {
    record
        .get(entity.primary_key)
        .filter(|value| !value.is_null())
        .map(SqlValue::as_text)
}

/// Parse a node id into the primary key's stored form.
pub fn parse_node_id(entity: &EntityMeta, id: &str) -> Option<SqlValue> {
    let scalar = entity
        .column(entity.primary_key)
        .map(|c| c.scalar)
        .unwrap_or(ScalarType::String);

    match scalar {
        ScalarType::Int => id.parse::<i64>().ok().map(SqlValue::Int),
        ScalarType::Uuid => uuid::Uuid::parse_str(id).ok().map(SqlValue::Uuid),
        _ => Some(SqlValue::String(id.to_string())),
    }
}

/// Fetch the row of `entity` identified by `id`.
///
/// Store failures are returned as errors; a malformed or ambiguous id is
/// `Ok(None)`.
pub async fn node_from_id(
    entity: &'static EntityMeta,
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<Record>> {
    let Some(value) = parse_node_id(entity, id) else {
        tracing::debug!(entity = entity.name, id, "Node id does not parse");
        return Ok(None);
    };

    let rows = EntityQuery::<Record>::new(entity)
        .where_eq(entity.primary_key, value)
        .limit(2)
        .fetch_all(pool)
        .await?;

    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => Ok(Some(row)),
        (None, _) => Ok(None),
        (Some(_), Some(_)) => {
            tracing::warn!(entity = entity.name, id, "Node id matched several rows");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::orm::ColumnDef;

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
    fn test_ids_follow_primary_key_type() {
        assert_eq!(parse_node_id(&TAG, "12"), Some(SqlValue::Int(12)));
        assert_eq!(parse_node_id(&TAG, "twelve"), None);

        let record = Record::new().with("id", 12i64);
        assert_eq!(node_id(&TAG, &record).as_deref(), Some("12"));
        assert_eq!(node_id(&TAG, &Record::new()), None);
    }

    #[tokio::test]
    async fn test_lookup() {
        let db = Database::connect(&crate::Config::default()).await.unwrap();
        db.create_tables(&[&TAG]).await.unwrap();
        sqlx::query("INSERT INTO tags (id, label) VALUES (1, 'rust'), (2, 'sql')")
            .execute(db.pool())
            .await
            .unwrap();

        let found = node_from_id(&TAG, db.pool(), "2").await.unwrap().unwrap();
        assert_eq!(found.get("label"), Some(&SqlValue::from("sql")));
        assert!(node_from_id(&TAG, db.pool(), "3").await.unwrap().is_none());
        assert!(node_from_id(&TAG, db.pool(), "x").await.unwrap().is_none());
    }
}
