//! # Row Writes
//!
//! Statement builders and row loops used by `save_data`. Nothing here opens or
//! commits a transaction: the store wraps every call in one, so a failing row
//! leaves the table exactly as it was.
//!
//! ## Statements
//!
//! ```text
//! insert:  INSERT INTO [t] ([a], [b]) VALUES (?1, ?2)
//! upsert:  INSERT INTO [t] ([k], [a]) VALUES (?1, ?2)
//!          ON CONFLICT ([k]) DO UPDATE SET [a] = excluded.[a]
//! upsert, every column a key:
//!          INSERT INTO [t] ([k1], [k2]) VALUES (?1, ?2)
//!          ON CONFLICT ([k1], [k2]) DO NOTHING
//! ```
//!
//! Each statement is prepared once per batch and executed per row. All names
//! must already be sanitized; values are always bound.
//!
//! ## Invariants
//!
//! - `ON CONFLICT` needs a unique index or primary key covering exactly the
//!   key columns; SQLite rejects the statement otherwise
//! - The key columns are never part of the `SET` list

use rusqlite::{params_from_iter, Connection};

use crate::sanitize::{quote, quote_list};
use crate::types::ColumnInfo;
use crate::value::Value;

// =============================================================================
// Statement Builders
// =============================================================================

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn build_insert_sql(table: &str, columns: &[String]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        quote_list(columns),
        placeholders(columns.len())
    )
}

/// Insert that merges on `keys`. Non-key columns are overwritten with the
/// incoming values; when every column is a key, conflicting rows are skipped.
pub(crate) fn build_upsert_sql(table: &str, columns: &[String], keys: &[String]) -> String {
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !keys.iter().any(|k| k.eq_ignore_ascii_case(c)))
        .map(|c| format!("{0} = excluded.{0}", quote(c)))
        .collect();

    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "{} ON CONFLICT ({}) {action}",
        build_insert_sql(table, columns),
        quote_list(keys)
    )
}

// =============================================================================
// Row Loops
// =============================================================================

/// Inserts every row; returns the number inserted.
pub(crate) fn insert_rows(
    conn: &Connection,
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> rusqlite::Result<usize> {
    let sql = build_insert_sql(table, columns);
    execute_per_row(conn, &sql, rows)
}

/// Upserts every row; returns the number of rows inserted or updated.
pub(crate) fn upsert_rows(
    conn: &Connection,
    table: &str,
    columns: &[String],
    keys: &[String],
    rows: &[Vec<Value>],
) -> rusqlite::Result<usize> {
    let sql = build_upsert_sql(table, columns, keys);
    execute_per_row(conn, &sql, rows)
}

fn execute_per_row(conn: &Connection, sql: &str, rows: &[Vec<Value>]) -> rusqlite::Result<usize> {
    tracing::debug!(sql, rows = rows.len(), "executing per-row statement");

    let mut stmt = conn.prepare(sql)?;
    let mut changed = 0;
    for row in rows {
        changed += stmt.execute(params_from_iter(row.iter()))?;
    }
    Ok(changed)
}

/// Clears a table without touching its definition.
pub(crate) fn delete_all_rows(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    conn.execute(&format!("DELETE FROM {}", quote(table)), [])
}

// =============================================================================
// Schema Fit
// =============================================================================

/// Batch columns the table does not have, compared case-insensitively.
///
/// Together with [`unfilled_columns`], an empty result means every row of the
/// batch can be inserted into the existing definition by name.
pub(crate) fn missing_columns(batch_columns: &[String], table_columns: &[ColumnInfo]) -> Vec<String> {
    batch_columns
        .iter()
        .filter(|c| !table_columns.iter().any(|t| t.name.eq_ignore_ascii_case(c)))
        .cloned()
        .collect()
}

/// Table columns that need a value but are absent from the batch.
pub(crate) fn unfilled_columns(batch_columns: &[String], table_columns: &[ColumnInfo]) -> Vec<String> {
    table_columns
        .iter()
        .filter(|t| t.requires_value())
        .filter(|t| !batch_columns.iter().any(|c| c.eq_ignore_ascii_case(&t.name)))
        .map(|t| t.name.clone())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
