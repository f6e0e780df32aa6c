//! # Error Handling for findb
//!
//! A single error enum ([`Error`]) covers every failure mode of the store and
//! the finance wrapper. Variants map onto the categories callers act on:
//!
//! | Category | Variant | Typical Response |
//! |----------|---------|------------------|
//! | Missing resource | [`Error::NotFound`] | Create the table, or pass `auto_create` |
//! | Caller mistake | [`Error::InvalidArgument`] | Fix the call |
//! | Policy refusal | [`Error::TableExists`] | Pick another write policy |
//! | Degraded replace | [`Error::SchemaConflict`] | Inspect the warning, restore constraints |
//! | Backend failure | [`Error::Backend`] | Log and investigate |
//!
//! Backend errors always carry the operation and the table they happened on.
//! They are attached with [`BackendContext::context`] instead of a blanket
//! `From<rusqlite::Error>`, so a raw SQLite error can never reach the caller
//! without that context.

use thiserror::Error;

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur in findb operations.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Caller Errors
    // =========================================================================

    /// A table (or other named resource) does not exist.
    ///
    /// Returned by reads, drops, DDL lookups, and by `save_data` when the
    /// target table is missing and `auto_create` was not requested.
    #[error("{resource} '{name}' does not exist")]
    NotFound {
        /// What kind of thing was missing ("table", "database file").
        resource: &'static str,
        /// Its (sanitized) name.
        name: String,
    },

    /// The call itself is malformed.
    ///
    /// Unsupported write policy, upsert without a unique key, identifiers that
    /// sanitize to nothing or collide after sanitization, ragged row batches,
    /// and integers that do not fit a 64-bit signed column.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The `fail` write policy found an existing table.
    #[error("table '{table}' already exists and the write policy is 'fail'")]
    TableExists {
        /// The sanitized table name.
        table: String,
    },

    // =========================================================================
    // Warnings
    // =========================================================================

    /// The incoming batch did not fit the preserved schema during `replace`.
    ///
    /// `save_data` never returns this as an `Err`: the store recovers by
    /// recreating the table from the batch. The variant is produced by
    /// [`SaveOutcome::warning`](crate::types::SaveOutcome::warning) so the
    /// caller can see that the prior constraints are gone.
    #[error("schema conflict on table '{table}': {detail}")]
    SchemaConflict {
        /// The sanitized table name.
        table: String,
        /// Why the preserved schema could not take the batch.
        detail: String,
    },

    // =========================================================================
    // Backend Errors
    // =========================================================================

    /// SQLite rejected a statement or the file could not be used.
    ///
    /// Constraint violations, locked or corrupt files, disk full, and SQL the
    /// backend cannot parse all end up here.
    #[error("{operation} failed on '{target}': {source}")]
    Backend {
        /// The store operation that was running ("save_data", "get_query", ...).
        operation: &'static str,
        /// Table name, or `"query"` for free-form SQL.
        target: String,
        /// The underlying rusqlite error.
        #[source]
        source: rusqlite::Error,
    },
}

impl Error {
    /// Shorthand for a missing table.
    pub(crate) fn table_not_found(name: impl Into<String>) -> Self {
        Error::NotFound {
            resource: "table",
            name: name.into(),
        }
    }

    /// Returns true if this is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns the underlying SQLite error, if this is a backend failure.
    pub fn backend_source(&self) -> Option<&rusqlite::Error> {
        match self {
            Error::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}

// =============================================================================
// Backend Context
// =============================================================================

/// Attaches operation and target information to rusqlite results.
///
/// ```rust,ignore
/// conn.execute_batch(sql).context("execute_batch", "query")?;
/// ```
pub(crate) trait BackendContext<T> {
    fn context(self, operation: &'static str, target: &str) -> Result<T>;
}

impl<T> BackendContext<T> for std::result::Result<T, rusqlite::Error> {
    fn context(self, operation: &'static str, target: &str) -> Result<T> {
        self.map_err(|source| Error::Backend {
            operation,
            target: target.to_string(),
            source,
        })
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================
