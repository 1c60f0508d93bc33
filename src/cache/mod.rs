//! Record/replay cache engine.
//!
//! The recorder side (`DictionaryCache`) runs a query against a live backing
//! connection, materializes the whole result, and stores it under
//! `(QueryKind, Fingerprint)`. The replay side (`ReadOnlyCache`) answers the
//! same query from the stored snapshot alone and fails loudly on a miss.
//!
//! The three query kinds live in separate key namespaces: the same SQL run
//! once as a reader and once as a scalar yields two independent entries.

mod criteria;
mod roles;
mod snapshot;
mod store;

pub use criteria::{Fingerprint, ParameterCriteria, QueryCriteria};
pub use roles::{QueryRecorder, QueryRetriever};
pub use snapshot::{Column, Snapshot, Table};
pub use store::{CacheEntry, DictionaryCache, ReadOnlyCache};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backing::BackingError;

/// Which execute-* call produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Rows,
    Scalar,
    NonQuery,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryKind::Rows => "rows",
            QueryKind::Scalar => "scalar",
            QueryKind::NonQuery => "non-query",
        };
        f.write_str(name)
    }
}

/// Key of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub kind: QueryKind,
    pub fingerprint: Fingerprint,
}

impl CacheKey {
    pub fn new(kind: QueryKind, criteria: &QueryCriteria) -> Self {
        Self {
            kind,
            fingerprint: criteria.fingerprint(),
        }
    }
}

/// Cache error types
#[derive(Error, Debug)]
pub enum CacheError {
    /// Replay was asked for something that was never recorded. Distinct from a
    /// recorded empty result.
    #[error("No recorded {kind} result for query fingerprint {fingerprint}")]
    NoRecordedResult { kind: QueryKind, fingerprint: Fingerprint },

    #[error("Cache entry {fingerprint} holds a {found} snapshot where a {kind} result was expected")]
    ShapeMismatch {
        kind: QueryKind,
        fingerprint: Fingerprint,
        found: &'static str,
    },

    #[error(transparent)]
    Backing(#[from] BackingError),

    #[error("Failed to access cache file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cache file contents: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache entry {fingerprint} row {row} has {width} cells for {columns} columns")]
    RaggedRow {
        fingerprint: Fingerprint,
        row: usize,
        width: usize,
        columns: usize,
    },
}
