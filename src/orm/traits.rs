//! Core entity description types for the ORM layer
//!
//! An entity is described once, as a static [`EntityMeta`], and everything
//! else (filter shapes, sort enums, SQL, GraphQL types) is derived from it.

use sqlx::sqlite::SqliteRow;

/// Comparable value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
    /// Stored as hyphenated TEXT
    Uuid,
    /// ISO-8601 TEXT
    DateTime,
    /// Arbitrary JSON stored as TEXT. Not comparable, so never filterable.
    Json,
}

impl ScalarType {
    /// SQLite column type (TEXT, INTEGER, REAL)
    pub fn sql_type(&self) -> &'static str {
        match self {
            ScalarType::Int | ScalarType::Boolean => "INTEGER",
            ScalarType::Float => "REAL",
            ScalarType::String | ScalarType::Uuid | ScalarType::DateTime | ScalarType::Json => {
                "TEXT"
            }
        }
    }

    /// GraphQL scalar name this column is exposed as.
    pub fn graphql_name(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::Uuid => "UUID",
            ScalarType::DateTime => "DateTime",
            ScalarType::Json => "JSON",
        }
    }

    pub fn is_filterable(&self) -> bool {
        !matches!(self, ScalarType::Json)
    }

    pub fn is_sortable(&self) -> bool {
        !matches!(self, ScalarType::Json)
    }
}

/// Column definition for schema generation.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    pub scalar: ScalarType,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub is_primary_key: bool,
    /// Default value expression (e.g., "datetime('now')")
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, scalar: ScalarType) -> Self {
        Self {
            name,
            scalar,
            nullable: false,
            is_primary_key: false,
            default: None,
        }
    }

    pub const fn primary_key(self) -> Self {
        Self {
            is_primary_key: true,
            ..self
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn default_expr(self, default: &'static str) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    /// Whether the store fills this column in on insert: an integer primary
    /// key, or a timestamp with a default.
    pub fn is_autogenerated(&self) -> bool {
        (self.is_primary_key && self.scalar == ScalarType::Int)
            || (self.scalar == ScalarType::DateTime && self.default.is_some())
    }

    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(self.name), self.scalar.sql_type());

        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }

        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        sql
    }
}

/// A relationship from one entity to another.
///
/// `local_column` on this entity joins `remote_column` on the target.
#[derive(Debug, Clone)]
pub struct RelationDef {
    /// Field name exposed on the owning entity
    pub name: &'static str,
    /// Target entity name
    pub target: &'static str,
    pub local_column: &'static str,
    pub remote_column: &'static str,
    /// One-to-many when true, many-to-one otherwise
    pub multiple: bool,
}

/// Metadata about a database entity (table).
#[derive(Debug)]
pub struct EntityMeta {
    /// Entity (and GraphQL type) name, e.g. "Article"
    pub name: &'static str,
    /// Plural used for root connection fields, e.g. "Articles"
    pub plural: &'static str,
    /// The SQL table name (e.g., "articles")
    pub table: &'static str,
    /// The primary key column name (e.g., "id")
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
    pub relations: &'static [RelationDef],
}

impl EntityMeta {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// All field names in declaration order: columns first, then relations.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|c| c.name)
            .chain(self.relations.iter().map(|r| r.name))
            .collect()
    }

    /// Build a SELECT query for all columns
    pub fn select_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c.name)).collect();
        format!("SELECT {} FROM {}", columns.join(", "), quote_ident(self.table))
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    pub fn create_table_sql(&self) -> String {
        let column_defs: Vec<String> = self.columns.iter().map(|c| c.to_sql()).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            quote_ident(self.table),
            column_defs.join(",\n  ")
        )
    }
}

// Entity names are unique within a registry
impl PartialEq for EntityMeta {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.table == other.table
    }
}

impl Eq for EntityMeta {}

/// Implemented by typed entities that map to an [`EntityMeta`].
pub trait DatabaseEntity: Sized + Send + Sync {
    fn meta() -> &'static EntityMeta;
}

/// Trait for decoding a database row into an entity.
pub trait FromSqlRow: Sized {
    /// Decode a SQLite row into this entity type
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Quote an SQL identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Sort direction for ORDER BY clauses.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum OrderDirection {
    /// Ascending order (A-Z, 1-9, oldest-newest)
    #[default]
    Asc,
    /// Descending order (Z-A, 9-1, newest-oldest)
    Desc,
}

impl OrderDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }

    /// Suffix used in sort enum value names
    pub fn suffix(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Represents a SQL value that can be bound to a query.
///
/// Used by filters to collect values for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(uuid::Uuid),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder at the next parameter position
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Uuid(u) => query.bind(u.hyphenated().to_string()),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    /// Same as [`bind_to_query`](Self::bind_to_query) for scalar queries.
    pub fn bind_to_scalar<'q, O>(
        &'q self,
        query: sqlx::query::QueryScalar<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::QueryScalar<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Uuid(u) => query.bind(u.hyphenated().to_string()),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert a scalar JSON value. Lists and objects are not SQL values.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(SqlValue::Null),
            serde_json::Value::Bool(b) => Some(SqlValue::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(SqlValue::Int(i)),
                None => n.as_f64().map(SqlValue::Float),
            },
            serde_json::Value::String(s) => Some(SqlValue::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::String(s) => serde_json::Value::String(s.clone()),
            SqlValue::Int(i) => serde_json::Value::from(*i),
            SqlValue::Float(f) => serde_json::Value::from(*f),
            SqlValue::Bool(b) => serde_json::Value::Bool(*b),
            SqlValue::Uuid(u) => serde_json::Value::String(u.hyphenated().to_string()),
            SqlValue::Null => serde_json::Value::Null,
        }
    }

    /// Text form used for `like` patterns.
    pub fn as_text(&self) -> String {
        match self {
            SqlValue::String(s) => s.clone(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Uuid(u) => u.hyphenated().to_string(),
            SqlValue::Null => String::new(),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::String(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Int(i)
    }
}

impl From<i32> for SqlValue {
    fn from(i: i32) -> Self {
        SqlValue::Int(i as i64)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}

impl From<uuid::Uuid> for SqlValue {
    fn from(u: uuid::Uuid) -> Self {
        SqlValue::Uuid(u)
    }
}
