//! Data store capability consumed by handlers.
//!
//! # Responsibilities
//! - Define the minimal CRUD contract handlers see through `HandlerContext`
//! - Express row filters as values rather than query text
//!
//! # Design Decisions
//! - Tables are addressed by name; rows are JSON objects
//! - `fields == ["*"]` selects every column
//! - The store serializes its own access; the core adds no transactions or retries
//! - Errors propagate to the handler, which picks the status code

pub mod memory;

use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;

/// A single row.
pub type Row = Map<String, Value>;

/// Errors returned by a data store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("{fields} fields but {values} values supplied")]
    FieldCountMismatch { fields: usize, values: usize },

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Row filter: every condition must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Filter matching rows whose `field` equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_eq(field, value)
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Returns true if `row` satisfies every condition.
    ///
    /// Comparison is loose across numbers and strings, so a path parameter
    /// `"42"` matches a numeric id `42`.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            row.get(field)
                .map(|actual| loose_eq(actual, expected))
                .unwrap_or(false)
        })
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => a == b,
    }
}

/// Minimal CRUD over named tables.
pub trait DataStore: Send + Sync {
    /// Rows matching `filter` (all rows if `None`), projected to `fields`.
    fn get(&self, table: &str, fields: &[&str], filter: Option<&Filter>) -> Result<Vec<Row>, StoreError>;

    /// Insert a row and return it as stored.
    fn create(&self, table: &str, fields: &[&str], values: &[Value]) -> Result<Row, StoreError>;

    /// Update the rows matching `filter`; returns the first updated row.
    fn update(
        &self,
        table: &str,
        fields: &[&str],
        values: &[Value],
        filter: &Filter,
    ) -> Result<Option<Row>, StoreError>;

    /// Delete the rows matching `filter`; returns the first deleted row.
    fn delete(&self, table: &str, filter: &Filter) -> Result<Option<Row>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn filter_matches_loosely() {
        let r = row(json!({"id": 42, "name": "widget"}));
        assert!(Filter::eq("id", "42").matches(&r));
        assert!(Filter::eq("id", 42).matches(&r));
        assert!(Filter::eq("id", 42).and_eq("name", "widget").matches(&r));
        assert!(!Filter::eq("id", 43).matches(&r));
        assert!(!Filter::eq("missing", 1).matches(&r));
    }
}
