//! Values that cross the protocol boundary.
//!
//! `Value` is the only cell/parameter representation the protocol knows about.
//! Backing adapters convert their native types into it, snapshots store it, and
//! client readers extract Rust types from it through the `DatabaseValue` trait.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single database value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Declared database type of a parameter or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DbType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    #[default]
    String,
    AnsiString,
    Binary,
    DateTime,
    Guid,
    Object,
}

impl DbType {
    /// Map a SQL declared type name (e.g. `INTEGER`, `varchar(20)`) onto a `DbType`.
    ///
    /// Follows SQLite's affinity rules loosely so that both SQLite and
    /// PostgreSQL type names land somewhere sensible.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("BOOL") {
            DbType::Boolean
        } else if upper == "INT2" || upper == "SMALLINT" {
            DbType::Int16
        } else if upper == "INT4" || upper == "INT" {
            DbType::Int32
        } else if upper.contains("INT") {
            DbType::Int64
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") || upper == "NAME" {
            DbType::String
        } else if upper.contains("BLOB") || upper == "BYTEA" {
            DbType::Binary
        } else if upper == "FLOAT4" {
            DbType::Single
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            DbType::Double
        } else if upper.contains("NUMERIC") || upper.contains("DECIMAL") {
            DbType::Decimal
        } else if upper.contains("DATE") || upper.contains("TIME") {
            DbType::DateTime
        } else if upper == "UUID" {
            DbType::Guid
        } else {
            DbType::Object
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Value {
    /// The type a parameter holding this value reports when none was declared.
    pub fn inferred_db_type(&self) -> DbType {
        match self {
            Value::Null => DbType::Object,
            Value::Boolean(_) => DbType::Boolean,
            Value::Integer(i) if i32::try_from(*i).is_ok() => DbType::Int32,
            Value::Integer(_) => DbType::Int64,
            Value::Real(_) => DbType::Double,
            Value::Text(_) => DbType::String,
            Value::Blob(_) => DbType::Binary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Trait for database values that can be extracted to Rust types.
///
/// Readers use this to implement their typed getters; anything that stores
/// cells (snapshots, backing adapters) only needs to produce `Value`.
pub trait DatabaseValue: Clone + fmt::Debug {
    /// Extract as String if the value is string-like.
    fn as_string(&self) -> Option<String>;

    /// Extract as i64 if the value is an integer.
    ///
    /// Booleans convert to 0/1 since SQLite stores them that way.
    fn as_i64(&self) -> Option<i64>;

    /// Extract as f64 if the value is numeric.
    fn as_f64(&self) -> Option<f64>;

    fn as_bool(&self) -> Option<bool>;

    fn as_bytes(&self) -> Option<Vec<u8>>;

    /// Get type name for error messages.
    fn type_name(&self) -> &'static str;

    /// Extract as String with a default value.
    fn as_string_or(&self, default: &str) -> String {
        self.as_string().unwrap_or_else(|| default.to_string())
    }
}

impl DatabaseValue for Value {
    fn as_string(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(*b as i64),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Blob(b) => Some(b.clone()),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}
