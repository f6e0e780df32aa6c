//! Identifier sanitization.
//!
//! SQLite placeholders bind values, not identifiers, so table and column names
//! have to be spliced into SQL text. Before that happens every name goes
//! through [`sanitize_identifier`]: ASCII letters, digits and `.@-_` survive,
//! anything else becomes `_`. The result is then always bracket-quoted with
//! [`quote`]; the whitelist contains no `]`, so a sanitized name cannot close
//! the quote.
//!
//! This is separate from value binding and never replaces it. It also does not
//! make distinct names stay distinct: `a b` and `a_b` both become `a_b`.
//! [`sanitize_columns`] rejects such collisions within one column list.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Characters allowed through besides ASCII letters and digits.
pub const ALLOWED_PUNCTUATION: &[char] = &['.', '@', '-', '_'];

/// Replaces every character outside the whitelist with `_`.
///
/// ```rust
/// use findb::sanitize::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("price history"), "price_history");
/// assert_eq!(sanitize_identifier("x]; DROP TABLE y; --"), "x___DROP_TABLE_y__--");
/// ```
pub fn sanitize_identifier(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitizes and rejects names that end up empty.
pub fn checked_identifier(text: &str) -> Result<String> {
    let sanitized = sanitize_identifier(text);
    if sanitized.is_empty() {
        return Err(Error::InvalidArgument("identifier is empty".to_string()));
    }
    Ok(sanitized)
}

/// Sanitizes a column list, rejecting empties and post-sanitization duplicates.
pub fn sanitize_columns<S: AsRef<str>>(columns: &[S]) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(columns.len());
    let mut sanitized = Vec::with_capacity(columns.len());

    for column in columns {
        let name = checked_identifier(column.as_ref())?;
        // SQLite column names are case-insensitive.
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(Error::InvalidArgument(format!(
                "column '{}' collides with another column after sanitization",
                column.as_ref()
            )));
        }
        sanitized.push(name);
    }

    Ok(sanitized)
}

/// Wraps an already-sanitized identifier in brackets.
pub fn quote(sanitized: &str) -> String {
    format!("[{sanitized}]")
}

/// Comma-separated, quoted list of already-sanitized identifiers.
pub(crate) fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
