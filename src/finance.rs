//! # Price Tables
//!
//! [`FinanceDatabase`] layers the two price tables on top of a
//! [`TabularStore`]:
//!
//! | Table | Rows | Written with |
//! |-------|------|--------------|
//! | `price_history` | one per ticker per trading day | `Upsert` on `(date, ticker_code)` |
//! | `price_current` | one per ticker | `Replace` |
//!
//! Both tables are created on open if missing, with an `id TEXT PRIMARY KEY`
//! filled from the store's identifier generator on every save. The unique
//! indexes are what make the history upsert work, and `Replace` keeps them
//! because it only clears rows when the batch fits the table.
//!
//! The download side hands over batches whose column names came from a
//! market-data client (`Open`, `Stock Splits`, ...). [`normalize_column_name`]
//! maps those onto the table's column names.

use chrono::{Days, NaiveDate};

use crate::batch::RowBatch;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::TabularStore;
use crate::types::{SaveOptions, SaveOutcome, WritePolicy};
use crate::value::Value;

pub const PRICE_HISTORY_TABLE: &str = "price_history";
pub const PRICE_CURRENT_TABLE: &str = "price_current";

/// Conflict target for history upserts.
pub const PRICE_HISTORY_KEY: [&str; 2] = ["date", "ticker_code"];

/// Creation DDL. Idempotent.
const CREATE_PRICE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS [price_history] (
    [id]            TEXT PRIMARY KEY,
    [ticker_code]   TEXT,
    [date]          DATE,
    [open]          FLOAT,
    [high]          FLOAT,
    [low]           FLOAT,
    [close]         FLOAT,
    [volume]        BIGINT,
    [dividends]     BIGINT,
    [stock_splits]  BIGINT
);

CREATE UNIQUE INDEX IF NOT EXISTS [idx_price_history_ticker_code_date]
    ON [price_history] ([ticker_code], [date]);

CREATE TABLE IF NOT EXISTS [price_current] (
    [id]            TEXT PRIMARY KEY,
    [ticker_code]   TEXT,
    [date]          DATE,
    [open]          FLOAT,
    [high]          FLOAT,
    [low]           FLOAT,
    [close]         FLOAT,
    [volume]        BIGINT,
    [dividends]     BIGINT,
    [stock_splits]  BIGINT
);

CREATE UNIQUE INDEX IF NOT EXISTS [idx_price_current_ticker_code_date]
    ON [price_current] ([ticker_code]);
"#;

/// The price-history database.
#[derive(Debug)]
pub struct FinanceDatabase {
    store: TabularStore,
}

impl FinanceDatabase {
    /// Opens the store and makes sure both price tables and their indexes
    /// exist.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::with_store(TabularStore::open(config)?)
    }

    pub fn with_store(store: TabularStore) -> Result<Self> {
        store.execute_batch(CREATE_PRICE_TABLES)?;
        tracing::debug!("price tables ready");
        Ok(Self { store })
    }

    /// The underlying store, for reads and ad-hoc statements.
    pub fn store(&self) -> &TabularStore {
        &self.store
    }

    /// Upserts daily rows; a ticker's existing day is overwritten.
    ///
    /// The batch must carry `date` and `ticker_code` and must not carry `id`.
    pub fn save_price_history(&self, batch: &RowBatch) -> Result<SaveOutcome> {
        let options = SaveOptions::new(WritePolicy::Upsert)
            .unique_key(PRICE_HISTORY_KEY)
            .auto_add_id(true);
        self.store.save_data(batch, PRICE_HISTORY_TABLE, &options)
    }

    /// Replaces the current-price snapshot.
    pub fn save_price_current(&self, batch: &RowBatch) -> Result<SaveOutcome> {
        let options = SaveOptions::new(WritePolicy::Replace).auto_add_id(true);
        self.store.save_data(batch, PRICE_CURRENT_TABLE, &options)
    }

    /// Latest `date` stored for `ticker_code`, or `None` if it has no rows.
    ///
    /// Only the first ten characters are parsed, so both `2024-01-02` and
    /// `2024-01-02 00:00:00` read as the same day.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the stored value is not a date.
    pub fn last_recorded_date(&self, ticker_code: &str) -> Result<Option<NaiveDate>> {
        let latest = self.store.get_query(
            "SELECT [date] FROM [price_history]
             WHERE [ticker_code] = ?1 AND [date] IS NOT NULL
             ORDER BY [date] DESC
             LIMIT 1",
            &[Value::from(ticker_code)],
        )?;

        let Some(value) = latest.rows().first().map(|row| &row[0]) else {
            return Ok(None);
        };

        value
            .as_date()
            .map(Some)
            .ok_or_else(|| bad_date(ticker_code, value))
    }

    /// Deletes history rows dated on or after `from`; returns how many.
    pub fn delete_from(&self, from: NaiveDate) -> Result<usize> {
        let deleted = self.store.execute(
            "DELETE FROM [price_history] WHERE [date] >= ?1",
            &[Value::from(from)],
        )?;
        tracing::info!(from = %from, deleted, "deleted recent price history");
        Ok(deleted)
    }

    /// Deletes the last `n` days of history counted back from `today`, so the
    /// next download refetches them.
    pub fn delete_last_n_days(&self, n: u32, today: NaiveDate) -> Result<usize> {
        let from = today
            .checked_sub_days(Days::new(u64::from(n)))
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{n} days before {today} is out of range"))
            })?;
        self.delete_from(from)
    }
}

fn bad_date(ticker_code: &str, value: &Value) -> Error {
    Error::InvalidArgument(format!(
        "bad date '{value}' recorded for ticker '{ticker_code}'"
    ))
}

/// Maps a free-form column name onto a table column name.
///
/// ASCII letters and digits are kept and lowercased; everything else becomes
/// `_`.
///
/// ```rust
/// use findb::finance::normalize_column_name;
///
/// assert_eq!(normalize_column_name("Stock Splits"), "stock_splits");
/// ```
pub fn normalize_column_name(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
