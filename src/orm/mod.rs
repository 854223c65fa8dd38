//! ORM layer
//!
//! Entities are described by a static [`EntityMeta`] (columns, relations,
//! primary key). The query builder turns that description plus compiled
//! filter predicates and sort specs into parameterized SQLite queries.
//!
//! ```rust,ignore
//! use ormgraph::filters::{ComparisonOperator, FilterNode, compile};
//! use ormgraph::orm::{EntityQuery, Record};
//!
//! let filter = FilterNode::new().field("headline", ComparisonOperator::Like, "foo");
//! let articles = EntityQuery::<Record>::new(&ARTICLE)
//!     .filter(compile(&ARTICLE, &filter)?)
//!     .fetch_all(db.pool())
//!     .await?;
//! ```

mod builder;
mod record;
mod traits;

pub use builder::*;
pub use record::Record;
pub use traits::*;
