//! In-memory data store with optional JSON snapshot persistence.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{DataStore, Filter, Row, StoreError};

/// Rows of one table plus its id sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Table {
    next_id: u64,
    rows: Vec<Row>,
}

impl Table {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A thread-safe store keeping declared tables in memory.
///
/// Each table has an auto-increment `id` column assigned on `create`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<DashMap<String, Table>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a store with the given (empty) tables.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let map = DashMap::new();
        for name in tables {
            map.insert(name.into(), Table::default());
        }
        Self {
            tables: Arc::new(map),
            snapshot_path: None,
        }
    }

    /// Create a store backed by a snapshot file, loading it if it exists.
    ///
    /// Declared tables missing from the snapshot start empty.
    pub fn load_from_file<I, S>(path: impl AsRef<Path>, tables: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.as_ref();
        let mut store = Self::new(tables);
        store.snapshot_path = Some(path.to_path_buf());

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let saved: HashMap<String, Table> = serde_json::from_reader(reader)?;
            for (name, table) in saved {
                store.tables.insert(name, table);
            }
            tracing::info!(path = %path.display(), tables = store.tables.len(), "Loaded store snapshot");
        }
        Ok(store)
    }

    /// Write all tables to the snapshot file, if one is configured.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.snapshot_path {
            let snapshot: HashMap<String, Table> = self
                .tables
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(writer, &snapshot)?;
            tracing::info!(path = %path.display(), tables = snapshot.len(), "Saved store snapshot");
        }
        Ok(())
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of rows in `table`, if it exists.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }
}

fn check_arity(fields: &[&str], values: &[Value]) -> Result<(), StoreError> {
    if fields.len() != values.len() {
        return Err(StoreError::FieldCountMismatch {
            fields: fields.len(),
            values: values.len(),
        });
    }
    Ok(())
}

fn project(row: &Row, fields: &[&str]) -> Row {
    if fields.iter().any(|f| *f == "*") {
        return row.clone();
    }
    fields
        .iter()
        .filter_map(|f| row.get(*f).map(|v| ((*f).to_string(), v.clone())))
        .collect()
}

impl DataStore for MemoryStore {
    fn get(&self, table: &str, fields: &[&str], filter: Option<&Filter>) -> Result<Vec<Row>, StoreError> {
        let t = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        Ok(t.rows
            .iter()
            .filter(|row| filter.map(|f| f.matches(row)).unwrap_or(true))
            .map(|row| project(row, fields))
            .collect())
    }

    fn create(&self, table: &str, fields: &[&str], values: &[Value]) -> Result<Row, StoreError> {
        check_arity(fields, values)?;
        let mut t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        let mut row = Row::new();
        row.insert("id".to_string(), Value::from(t.allocate_id()));
        for (field, value) in fields.iter().zip(values) {
            row.insert((*field).to_string(), value.clone());
        }
        t.rows.push(row.clone());
        Ok(row)
    }

    fn update(
        &self,
        table: &str,
        fields: &[&str],
        values: &[Value],
        filter: &Filter,
    ) -> Result<Option<Row>, StoreError> {
        check_arity(fields, values)?;
        let mut t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        let mut first = None;
        for row in t.rows.iter_mut().filter(|row| filter.matches(row)) {
            for (field, value) in fields.iter().zip(values) {
                row.insert((*field).to_string(), value.clone());
            }
            if first.is_none() {
                first = Some(row.clone());
            }
        }
        Ok(first)
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<Option<Row>, StoreError> {
        let mut t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        let mut first = None;
        t.rows.retain(|row| {
            if filter.matches(row) {
                if first.is_none() {
                    first = Some(row.clone());
                }
                false
            } else {
                true
            }
        });
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_assigns_incrementing_ids() {
        let store = MemoryStore::new(["article"]);
        let a = store.create("article", &["name"], &[json!("a")]).unwrap();
        let b = store.create("article", &["name"], &[json!("b")]).unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert_eq!(store.row_count("article"), Some(2));
    }

    #[test]
    fn get_projects_and_filters() {
        let store = MemoryStore::new(["article"]);
        store.create("article", &["name", "price"], &[json!("a"), json!(1)]).unwrap();
        store.create("article", &["name", "price"], &[json!("b"), json!(2)]).unwrap();

        let all = store.get("article", &["*"], None).unwrap();
        assert_eq!(all.len(), 2);

        let names = store.get("article", &["name"], Some(&Filter::eq("price", 2))).unwrap();
        assert_eq!(names, vec![json!({"name": "b"}).as_object().cloned().unwrap()]);
    }

    #[test]
    fn update_and_delete_return_affected_row() {
        let store = MemoryStore::new(["article"]);
        store.create("article", &["name"], &[json!("a")]).unwrap();

        let updated = store
            .update("article", &["name"], &[json!("z")], &Filter::eq("id", "1"))
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], json!("z"));

        assert!(store
            .update("article", &["name"], &[json!("q")], &Filter::eq("id", 99))
            .unwrap()
            .is_none());

        let deleted = store.delete("article", &Filter::eq("id", 1)).unwrap().unwrap();
        assert_eq!(deleted["name"], json!("z"));
        assert_eq!(store.row_count("article"), Some(0));
        assert!(store.delete("article", &Filter::eq("id", 1)).unwrap().is_none());
    }

    #[test]
    fn unknown_table_and_arity_errors() {
        let store = MemoryStore::new(["article"]);
        assert!(matches!(
            store.get("user", &["*"], None),
            Err(StoreError::UnknownTable(t)) if t == "user"
        ));
        assert!(matches!(
            store.create("article", &["name", "price"], &[json!("a")]),
            Err(StoreError::FieldCountMismatch { fields: 2, values: 1 })
        ));
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::load_from_file(&path, ["article"]).unwrap();
        store.create("article", &["name"], &[json!("kept")]).unwrap();
        store.save_to_file().unwrap();

        let loaded = MemoryStore::load_from_file(&path, ["article", "user"]).unwrap();
        assert_eq!(loaded.row_count("article"), Some(1));
        assert_eq!(loaded.row_count("user"), Some(0));
        let next = loaded.create("article", &["name"], &[json!("next")]).unwrap();
        assert_eq!(next["id"], json!(2));
    }
}
