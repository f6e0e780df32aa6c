//! # Table and Query Reads
//!
//! Reads turn a prepared statement into a [`RowBatch`]. Column names come from
//! the statement itself, so `SELECT *` and free-form queries are handled the
//! same way, and every cell is copied out through
//! [`Value::from_value_ref`].
//!
//! SQLite has no date type: dates written by the store come back as text.
//!
//! ```text
//! read_table(conn, "prices")
//!     │
//!     └── read_query(conn, "SELECT * FROM [prices]", [])
//!             │
//!             ├── prepare, bind params positionally
//!             └── step rows → Vec<Value> per row
//! ```

use rusqlite::{params_from_iter, Connection, Statement};

use crate::batch::RowBatch;
use crate::error::{BackendContext, Error, Result};
use crate::sanitize::quote;
use crate::value::Value;

/// Target used in backend errors for free-form SQL.
pub(crate) const QUERY_TARGET: &str = "query";

/// `SELECT *` from an already-sanitized table name.
pub(crate) fn read_table(conn: &Connection, table: &str) -> Result<RowBatch> {
    let sql = format!("SELECT * FROM {}", quote(table));
    let mut stmt = conn.prepare(&sql).context("get_table", table)?;
    collect_rows(&mut stmt, &[]).context("get_table", table)
}

/// Runs `sql` with `params` bound positionally (`?1`, `?2`, ... or `?`).
///
/// # Errors
///
/// `InvalidArgument` if the statement could change the database. Writes go
/// through `execute`.
pub(crate) fn read_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<RowBatch> {
    tracing::debug!(sql, params = params.len(), "reading query");

    let mut stmt = conn.prepare(sql).context("get_query", QUERY_TARGET)?;
    if !stmt.readonly() {
        return Err(Error::InvalidArgument(
            "get_query only accepts read-only statements".to_string(),
        ));
    }
    collect_rows(&mut stmt, params).context("get_query", QUERY_TARGET)
}

fn collect_rows(stmt: &mut Statement<'_>, params: &[Value]) -> rusqlite::Result<RowBatch> {
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(width);
        for i in 0..width {
            record.push(Value::from_value_ref(row.get_ref(i)?));
        }
        values.push(record);
    }

    Ok(RowBatch::from_result_set(columns, values))
}
