//! Cursor-based pagination types
//!
//! Implements the Relay connection model: cursors are opaque base64 tokens
//! encoding an element's offset in the full (unsliced) collection.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::orm::EntityQuery;

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Pagination arguments of a connection field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub after: Option<String>,
    pub before: Option<String>,
    pub first: Option<i64>,
    pub last: Option<i64>,
}

impl ConnectionArgs {
    pub fn first(n: i64) -> Self {
        Self {
            first: Some(n),
            ..Default::default()
        }
    }

    pub fn last(n: i64) -> Self {
        Self {
            last: Some(n),
            ..Default::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    /// Read `first`, `last`, `after` and `before` from an argument map.
    /// Other keys are ignored.
    pub fn from_json(args: &Map<String, Value>) -> Result<Self> {
        let count = |key: &str| -> Result<Option<i64>> {
            match args.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                    Error::InvalidPaginationArgument(format!("{} must be an integer, got {}", key, v))
                }),
            }
        };
        let cursor = |key: &str| -> Result<Option<String>> {
            match args.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(v) => Err(Error::InvalidPaginationArgument(format!(
                    "{} must be a cursor string, got {}",
                    key, v
                ))),
            }
        };

        Ok(Self {
            after: cursor("after")?,
            before: cursor("before")?,
            first: count("first")?,
            last: count("last")?,
        })
    }
}

/// Information about pagination in a connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    /// Cursor of the first item in this page
    pub start_cursor: Option<String>,
    /// Cursor of the last item in this page
    pub end_cursor: Option<String>,
}

/// An edge in a connection, containing a node and cursor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<T> {
    /// The item at the end of the edge
    pub node: T,
    /// A cursor for pagination
    pub cursor: String,
}

/// What a connection was paginated over.
#[derive(Debug, Clone)]
pub enum Resolved<T> {
    /// Lazy store query (re-executable for raw access)
    Query(EntityQuery<T>),
    /// Collection produced directly by a resolver
    Items(Vec<T>),
}

/// A paginated connection result.
#[derive(Debug, Clone)]
pub struct Connection<T> {
    /// The edges in this connection
    pub edges: Vec<Edge<T>>,
    /// Pagination information
    pub page_info: PageInfo,
    /// The full collection the page was cut from
    pub iterable: Resolved<T>,
    /// Total length of `iterable`
    pub length: usize,
}

impl<T> Connection<T> {
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireConnection<'a, T> {
    edges: &'a [Edge<T>],
    page_info: &'a PageInfo,
}

impl<T: Serialize> Connection<T> {
    /// `{edges: [{node, cursor}], pageInfo: {...}}`
    pub fn to_wire_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(WireConnection {
            edges: &self.edges,
            page_info: &self.page_info,
        })?)
    }
}

/// Encode an offset as a cursor string
pub fn encode_cursor(offset: usize) -> String {
    BASE64.encode(format!("{}{}", CURSOR_PREFIX, offset))
}

/// Decode a cursor string to an offset
pub fn decode_cursor(cursor: &str) -> Result<usize, &'static str> {
    let decoded = BASE64.decode(cursor).map_err(|_| "invalid cursor format")?;

    let s = String::from_utf8(decoded).map_err(|_| "invalid cursor encoding")?;

    let offset = s.strip_prefix(CURSOR_PREFIX).ok_or("invalid cursor prefix")?;

    offset.parse().map_err(|_| "invalid cursor value")
}

/// Slice bounds `[start, end)` of a page within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceBounds {
    pub start: usize,
    pub end: usize,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl SliceBounds {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compute the page bounds for `args` over a collection of `length` items.
///
/// `after`/`before` narrow the window to the elements strictly between the
/// two cursors, then `first` keeps the head and `last` the tail of that
/// window. Cursors that fail to decode are ignored.
pub fn slice_bounds(args: &ConnectionArgs, length: usize) -> Result<SliceBounds> {
    let after = args.after.as_deref().and_then(|c| decode_cursor(c).ok());
    let before = args.before.as_deref().and_then(|c| decode_cursor(c).ok());

    let mut start = after.map_or(0, |a| a.saturating_add(1)).min(length);
    let mut end = before.unwrap_or(length).min(length).max(start);

    if let Some(first) = args.first {
        let first = usize::try_from(first).map_err(|_| {
            Error::InvalidPaginationArgument(format!("first must be non-negative, got {}", first))
        })?;
        end = end.min(start.saturating_add(first));
    }

    if let Some(last) = args.last {
        let last = usize::try_from(last).map_err(|_| {
            Error::InvalidPaginationArgument(format!("last must be non-negative, got {}", last))
        })?;
        start = start.max(end.saturating_sub(last));
    }

    Ok(SliceBounds {
        start,
        end,
        has_previous_page: start > 0,
        has_next_page: end < length,
    })
}

/// Build edges and page info for a page whose first element sits at
/// `bounds.start` in the full collection.
pub fn build_page<T>(page: Vec<T>, bounds: &SliceBounds) -> (Vec<Edge<T>>, PageInfo) {
    let edges: Vec<Edge<T>> = page
        .into_iter()
        .enumerate()
        .map(|(i, node)| Edge {
            cursor: encode_cursor(bounds.start + i),
            node,
        })
        .collect();

    let page_info = PageInfo {
        has_next_page: bounds.has_next_page,
        has_previous_page: bounds.has_previous_page,
        start_cursor: edges.first().map(|e| e.cursor.clone()),
        end_cursor: edges.last().map(|e| e.cursor.clone()),
    };

    (edges, page_info)
}

/// Paginate an in-memory collection. Never suspends.
pub fn connection_from_items<T: Clone>(items: Vec<T>, args: &ConnectionArgs) -> Result<Connection<T>> {
    let length = items.len();
    let bounds = slice_bounds(args, length)?;
    let page = items[bounds.start..bounds.end].to_vec();
    let (edges, page_info) = build_page(page, &bounds);

    Ok(Connection {
        edges,
        page_info,
        iterable: Resolved::Items(items),
        length,
    })
}
