//! Store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time a connection waits on a locked database file.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// SQLite journal mode applied when the store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Write-ahead log. Readers don't block the writer.
    #[default]
    Wal,
    /// Rollback journal, deleted after each transaction.
    Delete,
}

impl JournalMode {
    /// The `PRAGMA journal_mode` value.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

/// Configuration for a [`TabularStore`](crate::store::TabularStore).
///
/// ```rust
/// use std::time::Duration;
/// use findb::StoreConfig;
///
/// let config = StoreConfig::new("finance-database.db")
///     .create_if_missing(true)
///     .busy_timeout(Duration::from_secs(1));
/// assert!(config.create_if_missing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path to the SQLite file.
    pub path: PathBuf,

    /// Create the file on open if it does not exist. Off by default, in which
    /// case a missing file is `NotFound`.
    pub create_if_missing: bool,

    /// How long each connection waits on a lock before failing.
    pub busy_timeout: Duration,

    pub journal_mode: JournalMode,

    /// Enforce foreign keys on every connection.
    pub foreign_keys: bool,
}

impl StoreConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            create_if_missing: false,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            journal_mode: JournalMode::default(),
            foreign_keys: true,
        }
    }

    pub fn create_if_missing(mut self, enabled: bool) -> Self {
        self.create_if_missing = enabled;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }
}
