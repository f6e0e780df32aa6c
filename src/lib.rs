//! # findb - Tabular Store on SQLite
//!
//! findb keeps tabular data in a single SQLite file. It provides:
//!
//! - **Policy-driven writes**: fail, append, schema-preserving replace, and
//!   key-based upsert, each all-or-nothing
//! - **Time-ordered identifiers**: 128-bit ids that sort by creation time,
//!   generated without coordination
//! - **Injection-safe SQL**: identifiers are whitelisted and bracket-quoted,
//!   values are always bound
//! - **Price tables**: a thin wrapper for daily and current price data
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       FinanceDatabase                           │
//! │         (price_history upsert, price_current replace)           │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TabularStore                             │
//! │          save_data, get_table, get_query, DDL lookups           │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │
//! │  │  sanitize   │  │ IdGenerator │  │  reader / writer /      │ │
//! │  │ identifiers │  │  (Mutex)    │  │  schema                 │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │  one connection per operation
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         SQLite                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Invariants
//!
//! 1. **All-or-nothing saves**: a failed `save_data` leaves the table as it was
//! 2. **Schema preservation**: `replace` keeps the caller's DDL whenever the
//!    batch fits it, and reports when it could not
//! 3. **Ordered identifiers**: ids from one generator strictly increase, even
//!    across clock regressions
//! 4. **No spliced values**: only sanitized identifiers reach SQL text
//!
//! ## Module Organization
//!
//! - [`error`]: error enum and `Result` alias
//! - [`id`]: identifier layout and generator
//! - [`value`]: cell values and numeric narrowing
//! - [`batch`]: row batches
//! - [`sanitize`]: identifier whitelisting and quoting
//! - [`types`]: write policies, save options, outcomes
//! - [`config`]: store configuration
//! - [`store`]: the tabular store
//! - [`finance`]: price tables
//!
//! Connections, introspection, reads, and row writes live in the private
//! `schema`, `reader`, and `writer` modules.

// =============================================================================
// Module Declarations
// =============================================================================

/// Error types for findb operations.
pub mod error;

/// Time-ordered 128-bit identifiers.
///
/// See [`IdGenerator`](id::IdGenerator) for the generation algorithm and
/// [`Identifier`](id::Identifier) for the bit layout.
pub mod id;

pub mod value;

pub mod batch;

/// Identifier sanitization for SQL text.
pub mod sanitize;

/// Write policies, save options, and save outcomes.
pub mod types;

pub mod config;

/// The SQLite-backed tabular store.
///
/// The main entry point is [`TabularStore`](store::TabularStore).
pub mod store;

/// Price history and current-price tables.
pub mod finance;

mod reader;
mod schema;
mod writer;

// =============================================================================
// Re-exports
// =============================================================================

pub use batch::RowBatch;
pub use config::{JournalMode, StoreConfig};
pub use error::{Error, Result};
pub use finance::FinanceDatabase;
pub use id::{Clock, IdGenerator, Identifier, ManualClock, SystemClock};
pub use store::TabularStore;
pub use types::{ColumnInfo, SaveOptions, SaveOutcome, SchemaOutcome, WritePolicy};
pub use value::Value;
