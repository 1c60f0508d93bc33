//! The two roles a cache can play for a command executor.

use std::sync::Arc;

use super::{CacheError, QueryCriteria, Table};
use crate::value::Value;

/// Populates the cache from live executions.
///
/// The proxy calls the entry point matching the execute-* call that just
/// succeeded. Row and scalar recording re-run the statement through the
/// recorder's own backing runner so the stored snapshot is fully read and
/// disconnected from the caller's result.
pub trait QueryRecorder: Send + Sync {
    fn record_query(&self, criteria: &QueryCriteria) -> Result<Arc<Table>, CacheError>;

    fn record_scalar(&self, criteria: &QueryCriteria) -> Result<Value, CacheError>;

    /// Non-queries cannot be re-run safely, so the live count is stored as is.
    fn record_non_query_row_count(&self, criteria: &QueryCriteria, rows_affected: i64) -> Result<(), CacheError>;
}

/// Answers executions from previously recorded snapshots only.
///
/// Every method fails with `CacheError::NoRecordedResult` on a miss.
pub trait QueryRetriever: Send + Sync {
    fn retrieve_rows(&self, criteria: &QueryCriteria) -> Result<Arc<Table>, CacheError>;

    fn retrieve_scalar(&self, criteria: &QueryCriteria) -> Result<Value, CacheError>;

    fn retrieve_non_query_row_count(&self, criteria: &QueryCriteria) -> Result<i64, CacheError>;
}
