//! Shared Article/Reporter fixture for integration tests

#![allow(dead_code)]

use ormgraph::orm::{ColumnDef, EntityMeta, Record, RelationDef, ScalarType, SqlValue};
use ormgraph::pagination::Connection;
use ormgraph::{Database, Registry};
use sqlx::sqlite::SqlitePoolOptions;

pub static REPORTER: EntityMeta = EntityMeta {
    name: "Reporter",
    plural: "Reporters",
    table: "reporters",
    primary_key: "id",
    columns: &[
        ColumnDef::new("id", ScalarType::Int).primary_key(),
        ColumnDef::new("name", ScalarType::String),
    ],
    relations: &[RelationDef {
        name: "articles",
        target: "Article",
        local_column: "id",
        remote_column: "reporter_id",
        multiple: true,
    }],
};

pub static ARTICLE: EntityMeta = EntityMeta {
    name: "Article",
    plural: "Articles",
    table: "articles",
    primary_key: "id",
    columns: &[
        ColumnDef::new("id", ScalarType::Int).primary_key(),
        ColumnDef::new("headline", ScalarType::String),
        ColumnDef::new("reporter_id", ScalarType::Int),
    ],
    relations: &[RelationDef {
        name: "reporter",
        target: "Reporter",
        local_column: "reporter_id",
        remote_column: "id",
        multiple: false,
    }],
};

const REPORTERS: &[(i64, &str)] = &[(1, "Ada"), (2, "Grace"), (3, "Linus"), (4, "Linus")];

/// Articles 1-5 contain "foo" in some casing; 6-8 don't.
const ARTICLES: &[(i64, &str, i64)] = &[
    (1, "Foo one", 1),
    (2, "foo two", 1),
    (3, "The FOO three", 2),
    (4, "Foo four", 2),
    (5, "Another foo", 3),
    (6, "X", 7),
    (7, "X", 1),
    (8, "Y", 7),
];

/// A single-connection in-memory database seeded with the fixture rows.
pub async fn seeded_database() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let db = Database::from_pool(pool);
    db.create_tables(&[&REPORTER, &ARTICLE])
        .await
        .expect("create tables");

    for (id, name) in REPORTERS {
        sqlx::query("INSERT INTO reporters (id, name) VALUES (?, ?)")
            .bind(*id)
            .bind(*name)
            .execute(db.pool())
            .await
            .expect("insert reporter");
    }
    for (id, headline, reporter_id) in ARTICLES {
        sqlx::query("INSERT INTO articles (id, headline, reporter_id) VALUES (?, ?, ?)")
            .bind(*id)
            .bind(*headline)
            .bind(*reporter_id)
            .execute(db.pool())
            .await
            .expect("insert article");
    }

    db
}

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_entity(&ARTICLE).expect("register Article");
    registry.register_entity(&REPORTER).expect("register Reporter");
    registry
}

pub fn article(id: i64, headline: &str, reporter_id: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("headline", headline)
        .with("reporter_id", reporter_id)
}

pub fn ids(connection: &Connection<Record>) -> Vec<i64> {
    connection
        .nodes()
        .map(|record| match record.get("id") {
            Some(SqlValue::Int(id)) => *id,
            other => panic!("unexpected id {:?}", other),
        })
        .collect()
}
