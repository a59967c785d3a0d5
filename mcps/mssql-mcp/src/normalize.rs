//! Result normalization
//!
//! Both row shapes a backend can produce collapse into one
//! [`TabularResult`].
//!
//! Keyed rows carry no separate description, so a keyed result with zero
//! rows has no columns. Positional rows always carry the description and
//! keep their columns even when empty.
//!
//! Duplicate column names collapse to one column at the first position,
//! holding the last value, on both paths.

use crate::db::{RawRows, Record};
use crate::types::TabularResult;

pub fn normalize(raw: RawRows) -> TabularResult {
    match raw {
        RawRows::Keyed(rows) => {
            let columns = rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default();
            TabularResult { columns, rows }
        }
        RawRows::Positional { description, rows } => {
            let mut columns: Vec<String> = Vec::with_capacity(description.len());
            for name in &description {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
            let rows = rows
                .into_iter()
                .map(|values| {
                    description
                        .iter()
                        .cloned()
                        .zip(values)
                        .collect::<Record>()
                })
                .collect();
            TabularResult { columns, rows }
        }
    }
}
