//! # Tabular Store
//!
//! [`TabularStore`] is the entry point for everything that touches the
//! database file: reading tables and queries back as [`RowBatch`]es,
//! introspecting and dropping tables, and writing batches under a
//! [`WritePolicy`].
//!
//! ## Operation Shape
//!
//! Every public operation follows the same steps:
//!
//! ```text
//! sanitize identifiers ──► open connection ──► (BEGIN) ──► statements ──► (COMMIT)
//!          │                      │                            │
//!          ▼                      ▼                            ▼
//!   InvalidArgument     NotFound / Backend          Backend, rolled back
//! ```
//!
//! The connection and any open transaction are dropped on every return path,
//! so a failure never leaves a half-written table or a dangling handle.
//!
//! ## Replace
//!
//! `replace` keeps the caller's table definition (keys, indexes, `NOT NULL`,
//! declared types) whenever the batch fits it:
//!
//! ```text
//! {no table}  ──► create from batch, insert                      => Created
//! {table}     ──► batch columns ⊆ table columns, and every NOT NULL column
//!                 without a default is in the batch?
//!                   yes ──► BEGIN; DELETE; INSERT; COMMIT          => Preserved
//!                           any row rejected: ROLLBACK, Err(Backend)
//!                   no  ──► BEGIN; DROP; CREATE from batch; INSERT; COMMIT
//!                                                                  => Recreated
//! ```
//!
//! A recreated table has lost its constraints, so the outcome carries the old
//! DDL and [`SaveOutcome::warning`] reports it as a schema conflict.

use std::sync::Arc;

use rusqlite::{params_from_iter, Connection};

use crate::batch::RowBatch;
use crate::config::StoreConfig;
use crate::error::{BackendContext, Error, Result};
use crate::id::IdGenerator;
use crate::reader::{self, QUERY_TARGET};
use crate::sanitize::{checked_identifier, sanitize_columns, sanitize_identifier};
use crate::schema;
use crate::types::{ColumnInfo, SaveOptions, SaveOutcome, SchemaOutcome, WritePolicy};
use crate::value::Value;
use crate::writer;

// =============================================================================
// Tabular Store
// =============================================================================

/// A SQLite-backed table store with policy-driven writes.
///
/// Cheap to share by reference; holds no open connection between calls.
///
/// ```rust,no_run
/// use findb::{RowBatch, SaveOptions, StoreConfig, TabularStore, Value, WritePolicy};
///
/// let store = TabularStore::open(StoreConfig::new("finance-database.db").create_if_missing(true))?;
///
/// let batch = RowBatch::from_rows(
///     ["ticker_code", "close"],
///     vec![vec![Value::from("VGS.AX"), Value::from(101.5)]],
/// )?;
/// let outcome = store.save_data(
///     &batch,
///     "prices",
///     &SaveOptions::new(WritePolicy::Append).auto_create(true),
/// )?;
/// assert_eq!(outcome.rows_written, 1);
/// # Ok::<(), findb::Error>(())
/// ```
#[derive(Debug)]
pub struct TabularStore {
    config: StoreConfig,
    generator: Arc<IdGenerator>,
}

impl TabularStore {
    /// Opens the store with its own identifier generator.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the file is missing and `create_if_missing` is off
    /// - `Backend` if the file cannot be opened or initialized
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::with_generator(config, Arc::new(IdGenerator::new()))
    }

    /// Opens the store with a shared identifier generator.
    pub fn with_generator(config: StoreConfig, generator: Arc<IdGenerator>) -> Result<Self> {
        let conn = schema::connect(&config)?;
        schema::initialize(&conn, &config)?;
        drop(conn);

        tracing::debug!(
            path = %config.path.display(),
            journal_mode = config.journal_mode.pragma_value(),
            "opened store"
        );
        Ok(Self { config, generator })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The generator used for `auto_add_id`.
    pub fn id_generator(&self) -> &Arc<IdGenerator> {
        &self.generator
    }

    /// Opens a fresh connection with the store's settings.
    ///
    /// For work the store does not cover. The caller owns the connection.
    pub fn connect(&self) -> Result<Connection> {
        schema::connect(&self.config)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Whether `name` (after sanitization) can be selected from.
    ///
    /// Never fails: a missing table, an unusable file, or any other backend
    /// error all answer `false`.
    pub fn table_exists(&self, name: &str) -> bool {
        let table = sanitize_identifier(name);
        if table.is_empty() {
            return false;
        }

        match self.connect() {
            Ok(conn) => exists_on(&conn, &table),
            Err(err) => {
                tracing::warn!(table = %table, error = %err, "table probe could not connect");
                false
            }
        }
    }

    /// The `CREATE TABLE` statement recorded for `name`.
    pub fn get_table_ddl(&self, name: &str) -> Result<String> {
        let table = checked_identifier(name)?;
        let conn = self.connect()?;
        schema::table_ddl(&conn, &table)
            .context("get_table_ddl", &table)?
            .ok_or_else(|| Error::table_not_found(table))
    }

    /// Column metadata for `name`, in declaration order.
    pub fn table_columns(&self, name: &str) -> Result<Vec<ColumnInfo>> {
        let table = checked_identifier(name)?;
        let conn = self.connect()?;
        let columns = schema::table_columns(&conn, &table).context("table_columns", &table)?;
        if columns.is_empty() {
            return Err(Error::table_not_found(table));
        }
        Ok(columns)
    }

    pub fn row_count(&self, name: &str) -> Result<u64> {
        let table = checked_identifier(name)?;
        let conn = self.connect()?;
        require_table(&conn, &table)?;
        schema::row_count(&conn, &table).context("row_count", &table)
    }

    /// Every user table, sorted. SQLite's internal `sqlite_%` tables are
    /// excluded.
    pub fn get_all_table_names(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        schema::table_names(&conn).context("get_all_table_names", QUERY_TARGET)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All rows of `name`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the table does not exist.
    pub fn get_table(&self, name: &str) -> Result<RowBatch> {
        let table = checked_identifier(name)?;
        let conn = self.connect()?;
        require_table(&conn, &table)?;
        reader::read_table(&conn, &table)
    }

    /// Runs a read query. `params` bind positionally and are never spliced
    /// into the SQL text.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for statements that would write; use
    /// [`execute`](Self::execute) for those.
    pub fn get_query(&self, sql: &str, params: &[Value]) -> Result<RowBatch> {
        let conn = self.connect()?;
        reader::read_query(&conn, sql, params)
    }

    // =========================================================================
    // Statements and DDL
    // =========================================================================

    /// Runs one parameterized statement; returns the number of changed rows.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let conn = self.connect()?;
        tracing::debug!(sql, params = params.len(), "executing statement");
        conn.execute(sql, params_from_iter(params.iter()))
            .context("execute", QUERY_TARGET)
    }

    /// Runs a parameterless script, such as a set of `CREATE` statements.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.connect()?;
        tracing::debug!(sql, "executing script");
        conn.execute_batch(sql).context("execute_batch", QUERY_TARGET)
    }

    /// # Errors
    ///
    /// `NotFound` if the table does not exist.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let table = checked_identifier(name)?;
        let conn = self.connect()?;
        require_table(&conn, &table)?;
        schema::drop_table(&conn, &table).context("drop_table", &table)?;
        tracing::info!(table = %table, "dropped table");
        Ok(())
    }

    /// Drops every user table in one transaction; returns how many.
    pub fn drop_all_tables(&self) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .context("drop_all_tables", QUERY_TARGET)?;

        let names = schema::table_names(&tx).context("drop_all_tables", QUERY_TARGET)?;
        for name in &names {
            schema::drop_table(&tx, name).context("drop_all_tables", name)?;
        }
        tx.commit().context("drop_all_tables", QUERY_TARGET)?;

        tracing::info!(tables = names.len(), "dropped all tables");
        Ok(names.len())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Writes `batch` into `table_name` under `options.policy`.
    ///
    /// See [`WritePolicy`] for what each policy does to an existing table.
    /// Rows are written in one transaction: on error nothing from the batch is
    /// stored and the table keeps its previous contents.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: empty table name, no columns, column names that
    ///   collide after sanitization, `auto_add_id` with an `id` column present,
    ///   `Upsert` without a usable `unique_key`
    /// - `NotFound`: the table is missing and `auto_create` is off
    /// - `TableExists`: `Fail` and the table exists
    /// - `Backend`: SQLite rejected a statement (constraint violations included)
    pub fn save_data(
        &self,
        batch: &RowBatch,
        table_name: &str,
        options: &SaveOptions,
    ) -> Result<SaveOutcome> {
        let table = checked_identifier(table_name)?;
        if batch.columns().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "batch for table '{table}' has no columns"
            )));
        }

        let columns = sanitize_columns(batch.columns())?;
        let mut batch = batch.clone().with_columns(columns);
        if options.auto_add_id {
            batch = batch.with_generated_ids(&self.generator)?;
        }

        let keys = match options.policy {
            WritePolicy::Upsert => upsert_keys(&batch, &options.unique_key)?,
            _ => Vec::new(),
        };

        let mut conn = self.connect()?;
        let exists = exists_on(&conn, &table);
        if !exists && !options.auto_create {
            return Err(Error::table_not_found(table));
        }

        let (rows_written, schema) = match (options.policy, exists) {
            (WritePolicy::Fail, true) => return Err(Error::TableExists { table }),
            (WritePolicy::Replace, true) => replace_existing(&mut conn, &table, &batch)?,
            (WritePolicy::Append, true) => {
                let written = in_transaction(&mut conn, &table, |tx| {
                    writer::insert_rows(tx, &table, batch.columns(), batch.rows())
                })?;
                (written, SchemaOutcome::Preserved)
            }
            (WritePolicy::Upsert, true) => {
                let written = in_transaction(&mut conn, &table, |tx| {
                    writer::upsert_rows(tx, &table, batch.columns(), &keys, batch.rows())
                })?;
                (written, SchemaOutcome::Preserved)
            }
            (policy, false) => {
                let written = in_transaction(&mut conn, &table, |tx| {
                    create_and_populate(tx, &table, &batch, policy, &keys)
                })?;
                (written, SchemaOutcome::Created)
            }
        };

        tracing::info!(
            table = %table,
            policy = %options.policy,
            rows = rows_written,
            schema = ?schema,
            "saved batch"
        );

        Ok(SaveOutcome {
            table,
            policy: options.policy,
            rows_written,
            schema,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

const SAVE_DATA: &str = "save_data";

/// Probe on an open connection. Absence is expected; anything else is logged.
fn exists_on(conn: &Connection, table: &str) -> bool {
    match schema::probe_table(conn, table) {
        Ok(()) => true,
        Err(err) if is_missing_table(&err) => false,
        Err(err) => {
            tracing::warn!(table, error = %err, "table probe failed");
            false
        }
    }
}

fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.starts_with("no such table")
    )
}

fn require_table(conn: &Connection, table: &str) -> Result<()> {
    if exists_on(conn, table) {
        Ok(())
    } else {
        Err(Error::table_not_found(table))
    }
}

/// Sanitized key columns, each of which must be in the batch.
fn upsert_keys(batch: &RowBatch, unique_key: &[String]) -> Result<Vec<String>> {
    if unique_key.is_empty() {
        return Err(Error::InvalidArgument(
            "upsert requires at least one unique key column".to_string(),
        ));
    }

    let keys = sanitize_columns(unique_key)?;
    if let Some(missing) = keys.iter().find(|k| batch.column_index(k).is_none()) {
        return Err(Error::InvalidArgument(format!(
            "unique key column '{missing}' is not in the batch"
        )));
    }
    Ok(keys)
}

/// Runs `body` inside a transaction; commits on success, rolls back on drop.
fn in_transaction<T>(
    conn: &mut Connection,
    table: &str,
    body: impl FnOnce(&Connection) -> rusqlite::Result<T>,
) -> Result<T> {
    let tx = conn.transaction().context(SAVE_DATA, table)?;
    let value = body(&tx).context(SAVE_DATA, table)?;
    tx.commit().context(SAVE_DATA, table)?;
    Ok(value)
}

/// New table from the batch's shape, then its rows. Upsert tables get a
/// unique index on the keys so `ON CONFLICT` has a target.
fn create_and_populate(
    conn: &Connection,
    table: &str,
    batch: &RowBatch,
    policy: WritePolicy,
    keys: &[String],
) -> rusqlite::Result<usize> {
    if policy == WritePolicy::Upsert {
        schema::create_table_from_batch(conn, table, batch.columns(), batch.rows(), Some(keys))?;
        writer::upsert_rows(conn, table, batch.columns(), keys, batch.rows())
    } else {
        schema::create_table_from_batch(conn, table, batch.columns(), batch.rows(), None)?;
        writer::insert_rows(conn, table, batch.columns(), batch.rows())
    }
}

fn replace_existing(
    conn: &mut Connection,
    table: &str,
    batch: &RowBatch,
) -> Result<(usize, SchemaOutcome)> {
    let previous_ddl = schema::table_ddl(conn, table)
        .context(SAVE_DATA, table)?
        .unwrap_or_default();
    let existing = schema::table_columns(conn, table).context(SAVE_DATA, table)?;
    let missing = writer::missing_columns(batch.columns(), &existing);
    let unfilled = writer::unfilled_columns(batch.columns(), &existing);

    if missing.is_empty() && unfilled.is_empty() {
        let written = in_transaction(conn, table, |tx| {
            writer::delete_all_rows(tx, table)?;
            writer::insert_rows(tx, table, batch.columns(), batch.rows())
        })?;
        return Ok((written, SchemaOutcome::Preserved));
    }

    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("batch columns not in the table: {}", missing.join(", ")));
    }
    if !unfilled.is_empty() {
        problems.push(format!(
            "required columns missing from the batch: {}",
            unfilled.join(", ")
        ));
    }
    let detail = problems.join("; ");
    tracing::warn!(
        table,
        detail = %detail,
        "replace cannot keep the existing schema; recreating table from batch"
    );

    let written = in_transaction(conn, table, |tx| {
        schema::drop_table(tx, table)?;
        schema::create_table_from_batch(tx, table, batch.columns(), batch.rows(), None)?;
        writer::insert_rows(tx, table, batch.columns(), batch.rows())
    })?;

    Ok((
        written,
        SchemaOutcome::Recreated {
            previous_ddl,
            detail,
        },
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, TabularStore) {
        let dir = TempDir::new().expect("create temp dir");
        let config = StoreConfig::new(dir.path().join("store.db")).create_if_missing(true);
        let store = TabularStore::open(config).expect("open store");
        (dir, store)
    }

    fn prices(rows: &[(&str, f64)]) -> RowBatch {
        RowBatch::from_rows(
            ["ticker_code", "close"],
            rows.iter()
                .map(|(t, c)| vec![Value::from(*t), Value::from(*c)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_missing_file_without_create() {
        let dir = TempDir::new().unwrap();
        let err = TabularStore::open(StoreConfig::new(dir.path().join("absent.db"))).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_table_exists_never_fails() {
        let (_dir, store) = temp_store();
        assert!(!store.table_exists("prices"));
        assert!(!store.table_exists(""));
        assert!(!store.table_exists("\u{e9}\u{e9}"));

        store.execute_batch("CREATE TABLE prices (a)").unwrap();
        assert!(store.table_exists("prices"));
    }

    #[test]
    fn test_missing_table_operations_are_not_found() {
        let (_dir, store) = temp_store();
        assert!(store.get_table("nope").unwrap_err().is_not_found());
        assert!(store.get_table_ddl("nope").unwrap_err().is_not_found());
        assert!(store.drop_table("nope").unwrap_err().is_not_found());
        assert!(store.table_columns("nope").unwrap_err().is_not_found());
        assert!(store.row_count("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_save_without_auto_create_is_not_found() {
        let (_dir, store) = temp_store();
        let err = store
            .save_data(&prices(&[("A", 1.0)]), "prices", &SaveOptions::new(WritePolicy::Append))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.table_exists("prices"));
    }

    #[test]
    fn test_save_rejects_empty_table_name_and_columns() {
        let (_dir, store) = temp_store();
        let options = SaveOptions::new(WritePolicy::Append).auto_create(true);

        let err = store.save_data(&prices(&[]), "", &options).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let empty = RowBatch::new(Vec::<String>::new());
        let err = store.save_data(&empty, "t", &options).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_upsert_key_validation() {
        let (_dir, store) = temp_store();
        let batch = prices(&[("A", 1.0)]);

        let err = store
            .save_data(&batch, "t", &SaveOptions::new(WritePolicy::Upsert).auto_create(true))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let options = SaveOptions::new(WritePolicy::Upsert)
            .auto_create(true)
            .unique_key(["date"]);
        let err = store.save_data(&batch, "t", &options).unwrap_err();
        assert!(err.to_string().contains("'date'"));
        assert!(!store.table_exists("t"));
    }

    #[test]
    fn test_failed_append_writes_nothing() {
        let (_dir, store) = temp_store();
        store
            .execute_batch("CREATE TABLE prices (ticker_code TEXT UNIQUE, close REAL)")
            .unwrap();

        let err = store
            .save_data(
                &prices(&[("A", 1.0), ("A", 2.0)]),
                "prices",
                &SaveOptions::new(WritePolicy::Append),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Backend { operation: "save_data", .. }));
        assert_eq!(store.row_count("prices").unwrap(), 0);
    }

    #[test]
    fn test_drop_all_tables() {
        let (_dir, store) = temp_store();
        store
            .execute_batch("CREATE TABLE a (x); CREATE TABLE b (x);")
            .unwrap();

        assert_eq!(store.get_all_table_names().unwrap(), ["a", "b"]);
        assert_eq!(store.drop_all_tables().unwrap(), 2);
        assert!(store.get_all_table_names().unwrap().is_empty());
    }

    #[test]
    fn test_execute_binds_values() {
        let (_dir, store) = temp_store();
        store.execute_batch("CREATE TABLE t (name TEXT)").unwrap();

        let changed = store
            .execute("INSERT INTO t VALUES (?1)", &[Value::from("x'); DROP TABLE t; --")])
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(store.row_count("t").unwrap(), 1);
    }

    #[test]
    fn test_shared_generator() {
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(IdGenerator::new());
        let store = TabularStore::with_generator(
            StoreConfig::new(dir.path().join("s.db")).create_if_missing(true),
            Arc::clone(&generator),
        )
        .unwrap();
        assert!(Arc::ptr_eq(store.id_generator(), &generator));
    }
}
