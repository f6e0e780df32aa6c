//! # SQLite Connections and Schema Introspection
//!
//! Everything that opens a connection or reads/changes table definitions
//! lives here. The store owns no schema of its own: tables are defined by the
//! caller's DDL, and this module only inspects them, creates a table from a
//! batch's shape when asked to, and drops tables.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! store operation
//!     │
//!     ├── connect(config)      open file, busy timeout, foreign_keys
//!     │
//!     ├── ... statements ...
//!     │
//!     └── Connection dropped   closed on every path, including `?` returns
//! ```
//!
//! There is no pool. One logical writer at a time is assumed; SQLite's file
//! locking plus the busy timeout is the only cross-process protection.
//!
//! Functions taking `&Connection` return raw `rusqlite::Result`s. They also
//! accept a `Transaction` through deref, and callers attach the operation
//! name and table with [`BackendContext`](crate::error::BackendContext).

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::config::StoreConfig;
use crate::error::{BackendContext, Error, Result};
use crate::sanitize::{quote, quote_list};
use crate::types::ColumnInfo;
use crate::value::Value;

// =============================================================================
// Connections
// =============================================================================

/// Opens a connection configured from `config`.
///
/// # Errors
///
/// - `NotFound` if the file is missing and `create_if_missing` is off
/// - `Backend` if SQLite cannot open the file or apply the pragmas
pub(crate) fn connect(config: &StoreConfig) -> Result<Connection> {
    let target = config.path.display().to_string();

    if !config.create_if_missing && !config.path.exists() {
        return Err(Error::NotFound {
            resource: "database file",
            name: target,
        });
    }

    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if config.create_if_missing {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }

    let conn = Connection::open_with_flags(&config.path, flags).context("connect", &target)?;
    conn.busy_timeout(config.busy_timeout)
        .context("connect", &target)?;

    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys}"))
        .context("connect", &target)?;

    tracing::debug!(path = %target, "opened connection");
    Ok(conn)
}

/// Applies the persistent file-level settings. Called once when a store opens.
pub(crate) fn initialize(conn: &Connection, config: &StoreConfig) -> Result<()> {
    let target = config.path.display().to_string();

    // journal_mode answers with a row, which execute() would reject.
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = {}",
        config.journal_mode.pragma_value()
    ))
    .context("initialize", &target)?;

    Ok(())
}

// =============================================================================
// Introspection
// =============================================================================

/// Minimal existence probe: `SELECT 1 FROM [table] LIMIT 1`.
///
/// Works for views as well as tables. `table` must already be sanitized.
pub(crate) fn probe_table(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!("SELECT 1 FROM {} LIMIT 1", quote(table)))?;
    let mut rows = stmt.query([])?;
    rows.next()?;
    Ok(())
}

/// The `CREATE TABLE` statement SQLite recorded for `table`, if any.
pub(crate) fn table_ddl(conn: &Connection, table: &str) -> rusqlite::Result<Option<String>> {
    let ddl: Option<Option<String>> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(ddl.flatten())
}

/// Columns of `table` in declaration order. Empty if the table is missing.
pub(crate) fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let rows = stmt.query_map(params![table], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            declared_type: row.get(1)?,
            not_null: row.get(2)?,
            default_value: row.get(3)?,
            primary_key_position: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// Names of all user tables, sorted.
pub(crate) fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

pub(crate) fn row_count(conn: &Connection, table: &str) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote(table)),
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

// =============================================================================
// DDL
// =============================================================================

pub(crate) fn drop_table(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("DROP TABLE {}", quote(table)))
}

/// Creates `table` with one column per batch column, typed from the values.
///
/// With `unique_key`, a unique index over those columns is created too, named
/// `ux_<table>_<col>_<col>...`. All names must already be sanitized.
pub(crate) fn create_table_from_batch(
    conn: &Connection,
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
    unique_key: Option<&[String]>,
) -> rusqlite::Result<()> {
    let column_defs = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let affinity = infer_affinity(rows.iter().map(|r| &r[i]));
            format!("{} {affinity}", quote(name))
        })
        .collect::<Vec<_>>()
        .join(", ");

    let create = format!("CREATE TABLE {} ({column_defs})", quote(table));
    tracing::debug!(table, sql = %create, "creating table from batch");
    conn.execute_batch(&create)?;

    if let Some(keys) = unique_key {
        let index_name = format!("ux_{table}_{}", keys.join("_"));
        let create_index = format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            quote(&index_name),
            quote(table),
            quote_list(keys)
        );
        tracing::debug!(table, sql = %create_index, "creating unique key index");
        conn.execute_batch(&create_index)?;
    }

    Ok(())
}

/// Picks a column type from the non-null values of one column.
///
/// Integers only → `INTEGER`; integers and reals → `REAL`; dates → `DATE`;
/// date-times (optionally with dates) → `TIMESTAMP`; blobs → `BLOB`; anything
/// else, including an all-null column, → `TEXT`.
pub(crate) fn infer_affinity<'a>(values: impl Iterator<Item = &'a Value>) -> &'static str {
    #[derive(Default)]
    struct Seen {
        integer: bool,
        real: bool,
        text: bool,
        date: bool,
        datetime: bool,
        blob: bool,
    }

    let mut seen = Seen::default();
    for value in values {
        match value {
            Value::Null => {}
            Value::Integer(_) => seen.integer = true,
            Value::Real(_) => seen.real = true,
            Value::Text(_) => seen.text = true,
            Value::Date(_) => seen.date = true,
            Value::DateTime(_) => seen.datetime = true,
            Value::Blob(_) => seen.blob = true,
        }
    }

    let numeric = seen.integer || seen.real;
    let temporal = seen.date || seen.datetime;

    match (numeric, temporal, seen.text, seen.blob) {
        (true, false, false, false) if seen.real => "REAL",
        (true, false, false, false) => "INTEGER",
        (false, true, false, false) if seen.datetime => "TIMESTAMP",
        (false, true, false, false) => "DATE",
        (false, false, false, true) => "BLOB",
        _ => "TEXT",
    }
}

// =============================================================================
// Tests
// =============================================================================
