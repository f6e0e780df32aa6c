//! # Domain Types for findb
//!
//! Types describing how a [`RowBatch`](crate::batch::RowBatch) is written and
//! what happened when it was:
//!
//! - [`WritePolicy`]: how a batch is reconciled with an existing table
//! - [`SaveOptions`]: policy plus the per-call switches of `save_data`
//! - [`SaveOutcome`] / [`SchemaOutcome`]: the result, including whether the
//!   table's schema survived
//! - [`ColumnInfo`]: one row of `PRAGMA table_info`

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// =============================================================================
// Write Policy
// =============================================================================

/// How `save_data` reconciles a batch with the target table.
///
/// | Policy | Existing table | Missing table (with `auto_create`) |
/// |--------|----------------|------------------------------------|
/// | `Fail` | error | create, insert |
/// | `Append` | insert rows as-is | create, insert |
/// | `Replace` | clear rows, keep schema, insert | create, insert |
/// | `Upsert` | insert or update on key conflict | create with unique key, insert |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WritePolicy {
    Fail,
    Append,
    Replace,
    Upsert,
}

impl WritePolicy {
    /// Every recognized policy, in declaration order.
    pub const ALL: [WritePolicy; 4] = [
        WritePolicy::Fail,
        WritePolicy::Append,
        WritePolicy::Replace,
        WritePolicy::Upsert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WritePolicy::Fail => "fail",
            WritePolicy::Append => "append",
            WritePolicy::Replace => "replace",
            WritePolicy::Upsert => "upsert",
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WritePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        WritePolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "write policy '{s}' is not one of fail, append, replace, upsert"
                ))
            })
    }
}

// =============================================================================
// Save Options
// =============================================================================

/// Per-call switches for `save_data`.
///
/// ```rust
/// use findb::{SaveOptions, WritePolicy};
///
/// let options = SaveOptions::new(WritePolicy::Upsert)
///     .unique_key(["date", "ticker_code"])
///     .auto_add_id(true);
/// assert_eq!(options.unique_key, vec!["date", "ticker_code"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub policy: WritePolicy,

    /// Create the table from the batch's shape if it does not exist.
    ///
    /// A created table has no constraints beyond what `Upsert` needs, so this
    /// is off by default.
    pub auto_create: bool,

    /// Conflict target for `Upsert`; ignored by the other policies.
    pub unique_key: Vec<String>,

    /// Prepend an `id` column with one fresh identifier per row.
    pub auto_add_id: bool,
}

impl SaveOptions {
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            policy,
            auto_create: false,
            unique_key: Vec::new(),
            auto_add_id: false,
        }
    }

    pub fn auto_create(mut self, enabled: bool) -> Self {
        self.auto_create = enabled;
        self
    }

    pub fn unique_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_add_id(mut self, enabled: bool) -> Self {
        self.auto_add_id = enabled;
        self
    }
}

impl Default for SaveOptions {
    /// `Replace` without `auto_create`.
    fn default() -> Self {
        Self::new(WritePolicy::Replace)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// What happened to the target table's schema during a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOutcome {
    /// The table did not exist and was created from the batch.
    Created,

    /// The existing schema and its constraints were kept.
    Preserved,

    /// `Replace` could not fit the batch into the existing schema and rebuilt
    /// the table from the batch. Constraints from the old DDL are gone.
    Recreated {
        /// The DDL the table had before it was dropped.
        previous_ddl: String,
        /// Why the old schema was rejected.
        detail: String,
    },
}

/// The result of a successful `save_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Sanitized table name actually written.
    pub table: String,
    pub policy: WritePolicy,
    /// Rows inserted or upserted.
    pub rows_written: usize,
    pub schema: SchemaOutcome,
}

impl SaveOutcome {
    /// The non-fatal [`Error::SchemaConflict`] for a recreated table.
    pub fn warning(&self) -> Option<Error> {
        match &self.schema {
            SchemaOutcome::Recreated { detail, .. } => Some(Error::SchemaConflict {
                table: self.table.clone(),
                detail: detail.clone(),
            }),
            _ => None,
        }
    }

    /// True when the save succeeded but the table lost its previous schema.
    pub fn is_degraded(&self) -> bool {
        matches!(self.schema, SchemaOutcome::Recreated { .. })
    }
}

// =============================================================================
// Column Metadata
// =============================================================================

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type, possibly empty.
    pub declared_type: String,
    pub not_null: bool,
    /// Default expression as written in the DDL, if any.
    pub default_value: Option<String>,
    /// 1-based position in the primary key, 0 if not part of it.
    pub primary_key_position: u32,
}

impl ColumnInfo {
    /// True for a column an `INSERT` must name: `NOT NULL` without a default.
    ///
    /// An `INTEGER PRIMARY KEY` aliases the rowid and fills itself.
    pub fn requires_value(&self) -> bool {
        let rowid_alias =
            self.primary_key_position == 1 && self.declared_type.eq_ignore_ascii_case("INTEGER");
        self.not_null && self.default_value.is_none() && !rowid_alias
    }
}

// =============================================================================
// Tests
// =============================================================================
