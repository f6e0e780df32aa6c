#![allow(dead_code)]

use std::path::{Path, PathBuf};

use findb::{RowBatch, StoreConfig, TabularStore, Value};
use rusqlite::Connection;

pub fn create_temp_db_file(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join(name);
    (dir, path)
}

pub fn create_temp_store() -> (tempfile::TempDir, TabularStore) {
    let (dir, path) = create_temp_db_file("store.db");
    let store = TabularStore::open(StoreConfig::new(&path).create_if_missing(true))
        .expect("open store");
    (dir, store)
}

/// A raw connection for checks that bypass the store.
pub fn open_read_write(path: &Path) -> Connection {
    Connection::open(path).expect("open read-write connection")
}

pub fn batch(columns: &[&str], rows: Vec<Vec<Value>>) -> RowBatch {
    RowBatch::from_rows(columns.iter().copied(), rows).expect("build batch")
}

/// `(ticker_code, date, close)` rows.
pub fn price_rows(rows: &[(&str, &str, f64)]) -> RowBatch {
    batch(
        &["ticker_code", "date", "close"],
        rows.iter()
            .map(|(ticker, date, close)| vec![Value::from(*ticker), Value::from(*date), Value::from(*close)])
            .collect(),
    )
}

/// Rows of a table sorted by their text rendering, for order-insensitive
/// comparisons.
pub fn sorted_rows(batch: &RowBatch) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = batch
        .rows()
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();
    rows.sort();
    rows
}
