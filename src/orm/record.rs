//! Untyped rows for schema-generated entities

use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::traits::{FromSqlRow, SqlValue};

/// A decoded row: column name to value, in SELECT order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(c, v)| (c.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, &value.to_json())?;
        }
        map.end()
    }
}

impl FromSqlRow for Record {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let mut record = Record::new();
        for column in row.columns() {
            let idx = column.ordinal();
            // SQLite reports the storage class of the value, not the declared type
            let storage = {
                let raw = row.try_get_raw(idx)?;
                if raw.is_null() {
                    None
                } else {
                    Some(raw.type_info().name().to_string())
                }
            };
            let value = match storage.as_deref() {
                None => SqlValue::Null,
                Some("INTEGER") | Some("INT8") | Some("BIGINT") => SqlValue::Int(row.try_get(idx)?),
                Some("BOOLEAN") => SqlValue::Bool(row.try_get(idx)?),
                Some("REAL") => SqlValue::Float(row.try_get(idx)?),
                Some(_) => SqlValue::String(row.try_get(idx)?),
            };
            record.values.push((column.name().to_string(), value));
        }
        Ok(record)
    }
}
