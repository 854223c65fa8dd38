//! ormgraph
//!
//! Exposes SQL-mapped entities as GraphQL connections. Each entity is
//! described once as an [`orm::EntityMeta`]; from that description the
//! crate derives filter inputs, sort enums and cursor-paginated connection
//! fields, and resolves them against SQLite.
//!
//! The resolution pipeline, leaves first:
//! - [`filters`] parses wire filters into a typed tree and compiles it to
//!   predicates
//! - [`connection::build_query`] applies predicates and sort to an entity
//!   query
//! - [`pagination`] slices a collection or query into a Relay connection
//! - [`connection::ConnectionField`] ties them together per field call,
//!   including custom resolvers
//!
//! [`schema::SchemaBuilder`] wires all of it into an `async-graphql`
//! dynamic schema.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod filters;
pub mod logging;
pub mod node;
pub mod orm;
pub mod pagination;
pub mod registry;
pub mod schema;
pub mod sort;

pub use config::Config;
pub use db::{Database, get_session};
pub use error::{Error, Result};
pub use registry::{ConnectionType, EntityType, Registry};
pub use schema::SchemaBuilder;
