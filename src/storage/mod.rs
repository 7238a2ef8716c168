pub mod infer;
pub mod table;

pub use table::{Column, DataType, Record, Table, Value};

use std::collections::HashMap;

use thiserror::Error;

/// One inbound row as the upload collaborator hands it over: column name
/// to loosely-typed JSON value. Key order of the first row defines the
/// table's column order.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("dataset contains no rows")]
    EmptyDataset,
}

/// Owns the named tables. Loading and resetting need `&mut self` while
/// queries borrow `&self`, so a host that shares the store across threads
/// wraps it in a single `Mutex`; nothing finer-grained is warranted.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: HashMap<String, Table>,
    initialized: bool,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Infer a schema from `rows` and store the table, replacing any
    /// existing table with the same name. The column set is defined by
    /// the first row's keys; values missing from later rows load as Null.
    pub fn load(&mut self, name: impl Into<String>, rows: &[RawRow]) -> Result<(), StoreError> {
        let first = rows.first().ok_or(StoreError::EmptyDataset)?;
        let column_names: Vec<String> = first.keys().cloned().collect();

        let column_values: Vec<Vec<Value>> = column_names
            .iter()
            .map(|col| {
                rows.iter()
                    .map(|row| row.get(col).map(infer::normalize).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        let columns: Vec<Column> = column_names
            .into_iter()
            .zip(&column_values)
            .map(|(name, values)| Column::new(name, infer::infer_column_type(values)))
            .collect();

        let records: Vec<Record> = (0..rows.len())
            .map(|i| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(c, col)| {
                        let value = infer::coerce(column_values[c][i].clone(), col.data_type);
                        (col.name.clone(), value)
                    })
                    .collect()
            })
            .collect();

        let name = name.into();
        self.tables
            .insert(name.clone(), Table::new(name, columns, records));
        self.initialized = true;
        Ok(())
    }

    /// Drop every table; queries fail with NotInitialized until the next
    /// load.
    pub fn reset(&mut self) {
        self.tables.clear();
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Table names are case-sensitive, exactly as loaded.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|n| n.as_str()).collect()
    }

    pub fn schema(&self, name: &str) -> Vec<Column> {
        self.table(name)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.table(name).map(|t| t.row_count()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_rows(rows: serde_json::Value) -> Vec<RawRow> {
        rows.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_load_infers_schema_from_first_row() {
        let mut store = TableStore::new();
        store
            .load(
                "people",
                &raw_rows(json!([
                    {"name": "Ada", "age": 36, "score": 9.5},
                    {"name": "Grace", "age": 45, "score": 8.0}
                ])),
            )
            .unwrap();

        let schema = store.schema("people");
        let names: Vec<&str> = schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "score"]);
        assert_eq!(schema[0].data_type, DataType::String);
        assert_eq!(schema[1].data_type, DataType::Integer);
        assert_eq!(schema[2].data_type, DataType::Real);
        assert_eq!(store.row_count("people"), 2);
    }

    #[test]
    fn test_load_empty_dataset_fails() {
        let mut store = TableStore::new();
        let err = store.load("t", &[]).unwrap_err();
        assert!(matches!(err, StoreError::EmptyDataset));
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_load_replaces_existing_table() {
        let mut store = TableStore::new();
        store
            .load("t", &raw_rows(json!([{"a": 1}, {"a": 2}])))
            .unwrap();
        store.load("t", &raw_rows(json!([{"a": 3}]))).unwrap();

        assert_eq!(store.row_count("t"), 1);
        assert_eq!(store.table("t").unwrap().rows[0].get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_missing_values_load_as_null() {
        let mut store = TableStore::new();
        store
            .load(
                "t",
                &raw_rows(json!([
                    {"a": 1, "b": "x"},
                    {"a": 2}
                ])),
            )
            .unwrap();

        let rows = &store.table("t").unwrap().rows;
        assert_eq!(rows[1].get("b"), Some(&Value::Null));
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = TableStore::new();
        store.load("t", &raw_rows(json!([{"a": 1}]))).unwrap();
        assert!(store.is_initialized());

        store.reset();
        assert!(!store.is_initialized());
        assert_eq!(store.row_count("t"), 0);
        assert!(store.schema("t").is_empty());
    }

    #[test]
    fn test_table_names_are_case_sensitive() {
        let mut store = TableStore::new();
        store.load("Sales", &raw_rows(json!([{"a": 1}]))).unwrap();

        assert!(store.table("Sales").is_some());
        assert!(store.table("sales").is_none());
    }

    #[test]
    fn test_row_count_of_absent_table_is_zero() {
        let store = TableStore::new();
        assert_eq!(store.row_count("nope"), 0);
    }
}
