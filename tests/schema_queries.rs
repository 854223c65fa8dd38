//! End-to-end GraphQL queries against a generated schema

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_graphql::dynamic::Schema;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{ARTICLE, REPORTER, article, registry, seeded_database};
use ormgraph::connection::{ResolverOutcome, default_connection_field_factory};
use ormgraph::{EntityType, Registry, SchemaBuilder};

async fn schema() -> Schema {
    SchemaBuilder::new(registry())
        .data(seeded_database().await)
        .build()
        .unwrap()
}

async fn execute(schema: &Schema, query: &str) -> Value {
    let response = schema.execute(query).await;
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    response.data.into_json().unwrap()
}

fn edge_ids(connection: &Value) -> Vec<i64> {
    connection["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|edge| edge["node"]["id"].as_i64().unwrap())
        .collect()
}

// ============================================================================
// Root Connections
// ============================================================================

#[tokio::test]
async fn test_where_like_with_nested_relation() {
    let schema = schema().await;
    let data = execute(
        &schema,
        r#"{
            allArticles(where: { headline: { like: "Foo" } }, first: 2) {
                totalCount
                edges { cursor node { id headline reporter { name } } }
                pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
            }
        }"#,
    )
    .await;

    let articles = &data["allArticles"];
    assert_eq!(articles["totalCount"], json!(5));
    assert_eq!(edge_ids(articles), vec![1, 2]);
    assert_eq!(articles["edges"][0]["node"]["reporter"]["name"], json!("Ada"));
    assert_eq!(
        articles["pageInfo"],
        json!({
            "hasNextPage": true,
            "hasPreviousPage": false,
            "startCursor": "YXJyYXljb25uZWN0aW9uOjA=",
            "endCursor": "YXJyYXljb25uZWN0aW9uOjE=",
        })
    );
}

#[tokio::test]
async fn test_sort_argument() {
    let schema = schema().await;
    let data = execute(&schema, "{ allArticles(sort: [ID_DESC], first: 1) { edges { node { id } } } }").await;
    assert_eq!(edge_ids(&data["allArticles"]), vec![8]);
}

#[tokio::test]
async fn test_in_and_or_filters() {
    let schema = schema().await;

    let data = execute(
        &schema,
        "{ allArticles(where: { reporter_id: { in: [2, 3] } }) { edges { node { id } } } }",
    )
    .await;
    assert_eq!(edge_ids(&data["allArticles"]), vec![3, 4, 5]);

    let data = execute(
        &schema,
        r#"{
            allArticles(where: { or: { headline: { equal: "X" }, reporter_id: { equal: 7 } } }) {
                edges { node { id } }
            }
        }"#,
    )
    .await;
    assert_eq!(edge_ids(&data["allArticles"]), vec![6, 7, 8]);
}

#[tokio::test]
async fn test_missing_single_relation_is_null() {
    let schema = schema().await;
    let data = execute(
        &schema,
        "{ allArticles(where: { id: { equal: 6 } }) { edges { node { reporter { name } } } } }",
    )
    .await;
    assert_eq!(data["allArticles"]["edges"][0]["node"]["reporter"], Value::Null);
}

// ============================================================================
// Relationship Connections
// ============================================================================

#[tokio::test]
async fn test_relationship_connection_is_scoped_to_parent() {
    let schema = schema().await;
    let data = execute(
        &schema,
        r#"{
            allReporters(where: { name: { equal: "Ada" } }) {
                edges { node { name articles { totalCount edges { node { id } } } } }
            }
        }"#,
    )
    .await;

    let ada = &data["allReporters"]["edges"][0]["node"];
    assert_eq!(ada["name"], json!("Ada"));
    assert_eq!(ada["articles"]["totalCount"], json!(3));
    assert_eq!(edge_ids(&ada["articles"]), vec![1, 2, 7]);
}

#[tokio::test]
async fn test_custom_connection_field_factory() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut registry = Registry::new();
    registry.register_entity(&ARTICLE).unwrap();
    registry
        .register(EntityType::new(&REPORTER).connection_field_factory(
            move |relation, registry| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(default_connection_field_factory(relation, registry)?
                    .with_resolver(|_, _| ResolverOutcome::Ready(vec![article(42, "Pinned", 1)])))
            },
        ))
        .unwrap();

    let schema = SchemaBuilder::new(registry)
        .data(seeded_database().await)
        .build()
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let data = execute(
        &schema,
        r#"{
            allReporters(where: { name: { equal: "Ada" } }) {
                edges { node { articles { edges { node { id headline } } } } }
            }
        }"#,
    )
    .await;
    let articles = &data["allReporters"]["edges"][0]["node"]["articles"];
    assert_eq!(edge_ids(articles), vec![42]);

    // The factory's field has no `where` argument
    let response = schema
        .execute(r#"{ allReporters { edges { node { articles(where: {}) { totalCount } } } } }"#)
        .await;
    assert_eq!(response.errors.len(), 1);
}

// ============================================================================
// Field Selection and Nodes
// ============================================================================

#[tokio::test]
async fn test_only_and_excluded_fields() {
    let mut registry = Registry::new();
    registry
        .register(EntityType::new(&ARTICLE).exclude_autogenerated())
        .unwrap();
    registry
        .register(EntityType::new(&REPORTER).only_fields(["name"]))
        .unwrap();
    let schema = SchemaBuilder::new(registry)
        .data(seeded_database().await)
        .build()
        .unwrap();

    let data = execute(
        &schema,
        "{ allReporters(first: 1) { edges { node { name } } } }",
    )
    .await;
    assert_eq!(
        data["allReporters"]["edges"][0]["node"],
        json!({"name": "Ada"})
    );

    for query in [
        "{ allReporters { edges { node { id } } } }",
        "{ allReporters { edges { node { articles { totalCount } } } } }",
        "{ allArticles { edges { node { id } } } }",
    ] {
        let response = schema.execute(query).await;
        assert_eq!(response.errors.len(), 1, "{}", query);
    }

    // Excluded columns can still be filtered and sorted on
    let data = execute(
        &schema,
        "{ allArticles(where: { id: { lessThan: 3 } }, sort: [ID_DESC]) { edges { node { headline } } } }",
    )
    .await;
    assert_eq!(
        data["allArticles"]["edges"],
        json!([{"node": {"headline": "foo two"}}, {"node": {"headline": "Foo one"}}])
    );
}

#[tokio::test]
async fn test_node_lookup_by_id() {
    let mut registry = Registry::new();
    registry.register(EntityType::new(&ARTICLE).node()).unwrap();
    registry.register_entity(&REPORTER).unwrap();
    let schema = SchemaBuilder::new(registry)
        .data(seeded_database().await)
        .build()
        .unwrap();

    let data = execute(
        &schema,
        r#"{
            found: article(id: "3") { id headline reporter { name } }
            missing: article(id: "99") { id }
            malformed: article(id: "three") { id }
        }"#,
    )
    .await;
    assert_eq!(
        data,
        json!({
            "found": {"id": "3", "headline": "The FOO three", "reporter": {"name": "Grace"}},
            "missing": null,
            "malformed": null,
        })
    );

    let data = execute(
        &schema,
        "{ allArticles(first: 1) { edges { node { ... on Node { id } } } } }",
    )
    .await;
    assert_eq!(data["allArticles"]["edges"][0]["node"]["id"], json!("1"));
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_schema_without_session_reports_error() {
    let schema = SchemaBuilder::new(registry()).build().unwrap();
    let response = schema.execute("{ allArticles { totalCount } }").await;
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("no database session"));
}

#[tokio::test]
async fn test_negative_first_is_a_field_error() {
    let schema = schema().await;
    let response = schema.execute("{ allArticles(first: -1) { totalCount } }").await;
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("invalid pagination argument"));
}
