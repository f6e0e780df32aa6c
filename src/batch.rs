//! # Row Batches
//!
//! A [`RowBatch`] is the unit of data exchanged with the store: named, ordered
//! columns and rows of [`Value`]s. It is what `save_data` consumes and what
//! `get_table`/`get_query` produce.
//!
//! Batches read back from the store only hold SQLite storage classes: a saved
//! [`Value::Date`] or [`Value::DateTime`] comes back as [`Value::Text`]. Use
//! [`Value::as_date`] to recover the date.
//!
//! ## Invariant
//!
//! Every row has exactly one value per column. The only way to add rows checks
//! this, so the store never has to.

use crate::error::{Error, Result};
use crate::id::IdGenerator;
use crate::value::Value;

/// Name of the column added by `auto_add_id`.
pub const ID_COLUMN: &str = "id";

/// An ordered collection of rows sharing one column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowBatch {
    /// Creates an empty batch with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a batch from columns and rows in one go.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if any row's width differs from the column count.
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch = Self::new(columns);
        batch.rows.reserve(rows.len());
        for row in rows {
            batch.push_row(row)?;
        }
        Ok(batch)
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the row's width differs from the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::InvalidArgument(format!(
                "row {} has {} values but the batch has {} columns",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively like SQLite does.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// The cell at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Returns a copy of the batch with an `id` column in front, one fresh
    /// identifier per row, in row order.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the batch already has an `id` column.
    pub fn with_generated_ids(&self, generator: &IdGenerator) -> Result<Self> {
        if self.column_index(ID_COLUMN).is_some() {
            return Err(Error::InvalidArgument(format!(
                "batch already has an '{ID_COLUMN}' column"
            )));
        }

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(ID_COLUMN.to_string());
        columns.extend(self.columns.iter().cloned());

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut with_id = Vec::with_capacity(row.len() + 1);
                with_id.push(Value::from(generator.next_id()));
                with_id.extend(row.iter().cloned());
                with_id
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Assembles a batch whose rows were built against `columns`, as query
    /// results are.
    pub(crate) fn from_result_set(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// Replaces the column names, keeping the rows. Widths must match.
    pub(crate) fn with_columns(mut self, columns: Vec<String>) -> Self {
        debug_assert_eq!(columns.len(), self.columns.len());
        self.columns = columns;
        self
    }
}
