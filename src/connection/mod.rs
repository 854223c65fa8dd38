//! Connection fields and their resolution pipeline
//!
//! ```text
//! raw args ──► ResolveArgs ──► build_query ──► paginate_query ──► Connection
//!                   │                               ▲
//!                   └──► custom resolver ──► items ─┘
//! ```

mod args;
mod field;
mod query;
mod resolve;

pub use args::{RelationFilter, ResolveArgs};
pub use field::{
    ConnectionField, ConnectionFieldFactory, CustomResolver, ScopeFn, SortOption,
    default_connection_field_factory,
};
pub use query::build_query;
pub use resolve::{
    ConnectionResolution, ResolverOutcome, connection_resolver, paginate_query, resolve_connection,
};
