//! Live backing-database connections.
//!
//! The proxy executes commands against a `BackingConnection`, and the
//! recording cache uses one to materialize the snapshots it stores. The replay
//! path never touches this module.
//!
//! Two adapters ship with the crate:
//! - `SqliteBacking` via `rusqlite` (file or in-memory)
//! - `PostgresBacking` via the synchronous `postgres` client

mod config;
mod postgresql;
mod sqlite;

pub use config::BackingConfig;
pub use postgresql::PostgresBacking;
pub use sqlite::SqliteBacking;

use std::sync::Arc;

use thiserror::Error;

use crate::cache::{QueryCriteria, Table};
use crate::protocol::IsolationLevel;
use crate::value::Value;

/// Backing database error types
#[derive(Error, Debug)]
pub enum BackingError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("Failed to open backing database '{target}': {message}")]
    OpenFailed { target: String, message: String },

    #[error("{backend} backing does not support {feature}")]
    Unsupported { backend: &'static str, feature: String },

    #[error("Cannot convert column '{column}' of type {type_name}")]
    Conversion { column: String, type_name: String },

    #[error("Parameter {index} value {value} does not fit the database type {type_name}")]
    ParameterOutOfRange {
        index: usize,
        value: String,
        type_name: String,
    },

    #[error("Backing connection lock was poisoned")]
    Lock,
}

/// A live connection able to run the statements described by `QueryCriteria`.
///
/// Implementations are shared between the proxy and the recorder, so every
/// method takes `&self` and serializes access internally.
pub trait BackingConnection: Send + Sync {
    /// Get the backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;

    /// Run a statement that returns no rows and report how many rows it touched.
    fn execute_non_query(&self, criteria: &QueryCriteria) -> Result<i64, BackingError>;

    /// Run a query and read its entire result.
    ///
    /// The returned table is disconnected: every row has been read and no
    /// cursor stays open on the database.
    fn execute_reader(&self, criteria: &QueryCriteria) -> Result<Table, BackingError>;

    /// First column of the first row, or `Value::Null` for an empty result.
    fn execute_scalar(&self, criteria: &QueryCriteria) -> Result<Value, BackingError> {
        Ok(self.execute_reader(criteria)?.first_value())
    }

    fn begin(&self, _isolation_level: IsolationLevel) -> Result<(), BackingError> {
        self.execute_non_query(&QueryCriteria::text("BEGIN")).map(|_| ())
    }

    fn commit(&self) -> Result<(), BackingError> {
        self.execute_non_query(&QueryCriteria::text("COMMIT")).map(|_| ())
    }

    fn rollback(&self) -> Result<(), BackingError> {
        self.execute_non_query(&QueryCriteria::text("ROLLBACK")).map(|_| ())
    }
}

/// Produces a backing connection for a proxy connection being opened.
///
/// Receives the client's connection string.
pub type ConnectionFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn BackingConnection>, BackingError> + Send + Sync>;

/// A factory that hands out the same live connection every time.
///
/// This is how an in-memory database survives across proxy connections: every
/// open gets the one shared connection rather than a fresh empty database.
pub fn shared_factory(connection: Arc<dyn BackingConnection>) -> ConnectionFactory {
    Arc::new(move |_connection_string: &str| Ok(Arc::clone(&connection)))
}
