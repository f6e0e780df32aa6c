//! # Cell Values
//!
//! [`Value`] is the only type a row cell can hold. Converting into it is where
//! numeric narrowing happens: every integer becomes an `i64` and every float an
//! `f64` before it reaches a bound parameter, so nothing platform-width
//! dependent (`usize`, `isize`) or out of range for a SQLite INTEGER slips
//! through. Wide unsigned types convert with `TryFrom` and fail with
//! [`Error::InvalidArgument`] when they do not fit.
//!
//! Dates and date-times have no native SQLite storage class. They bind as
//! ISO-8601 text and read back as [`Value::Text`]; [`Value::as_date`] reads
//! either form.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

use crate::error::{Error, Result};
use crate::id::Identifier;

/// Text format used to bind [`Value::Date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Text format used to bind [`Value::DateTime`].
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// =============================================================================
// Value
// =============================================================================

/// A single cell in a [`RowBatch`](crate::batch::RowBatch).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Reals as-is, integers widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The calendar date of a date, a date-time, or ISO text starting with one.
    ///
    /// Stored dates come back from the database as text, so this is the way to
    /// recover them from a read batch.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            Value::Text(v) => NaiveDate::parse_from_str(v.get(..10)?, DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// The storage form this value is bound as.
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            Value::Null => SqlValue::Null,
            Value::Integer(v) => SqlValue::Integer(*v),
            Value::Real(v) => SqlValue::Real(*v),
            Value::Text(v) => SqlValue::Text(v.clone()),
            Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
            Value::Blob(v) => SqlValue::Blob(v.clone()),
        }
    }

    /// Copies a borrowed column value out of a result row.
    ///
    /// Text that is not valid UTF-8 is decoded lossily.
    pub fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Date(_) | Value::DateTime(_) => ToSqlOutput::Owned(self.to_sql_value()),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

macro_rules! integer_into_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

integer_into_value!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! wide_integer_try_into_value {
    ($($t:ty),*) => {
        $(
            impl TryFrom<$t> for Value {
                type Error = Error;

                fn try_from(v: $t) -> Result<Self> {
                    i64::try_from(v).map(Value::Integer).map_err(|_| {
                        Error::InvalidArgument(format!(
                            "integer {v} does not fit a 64-bit signed column"
                        ))
                    })
                }
            }
        )*
    };
}

wide_integer_try_into_value!(u64, usize, isize, i128, u128);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<Identifier> for Value {
    fn from(v: Identifier) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Tests
// =============================================================================
