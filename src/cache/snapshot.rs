//! Disconnected, fully materialized query results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{DbType, Value};

/// Column descriptor. Names are not unique: `SELECT id, id` yields two `id`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub db_type: DbType,
    /// Declared type name as reported by the database, e.g. `INTEGER`.
    pub data_type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, db_type: DbType, data_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type,
            data_type_name: data_type_name.into(),
        }
    }
}

/// A tabular result: ordered columns and ordered rows of cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Ordinal of the first column called `name`.
    ///
    /// An exact match wins; otherwise the first case-insensitive match.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// First cell of the first row, the shape execute-scalar returns.
    pub fn first_value(&self) -> Value {
        self.rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// A stored result of one of the three query shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum Snapshot {
    Rows(Arc<Table>),
    Scalar(Value),
    RowCount(i64),
}

impl Snapshot {
    /// One-line description for listings.
    pub fn summary(&self) -> String {
        match self {
            Snapshot::Rows(table) => format!("{} columns, {} rows", table.field_count(), table.rows.len()),
            Snapshot::Scalar(value) => format!("scalar {}", value),
            Snapshot::RowCount(count) => format!("{} rows affected", count),
        }
    }
}
