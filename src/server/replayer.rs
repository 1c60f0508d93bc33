//! Cache-only executor: answers every execution from recorded snapshots.

use std::sync::Arc;

use tracing::debug;

use super::executor::{Backing, CommandExecutor};
use super::SqlServer;
use crate::backing::BackingConnection;
use crate::cache::{QueryCriteria, QueryRetriever, Table};
use crate::protocol::{IsolationLevel, ProtocolResult};
use crate::value::Value;

/// Never touches a database. Opening a connection yields no backing
/// connection, transactions are bookkeeping only, and a statement that was
/// never recorded fails with `CacheError::NoRecordedResult`.
pub struct ReplayExecutor {
    retriever: Arc<dyn QueryRetriever>,
}

impl ReplayExecutor {
    pub fn new(retriever: Arc<dyn QueryRetriever>) -> Self {
        Self { retriever }
    }
}

impl CommandExecutor for ReplayExecutor {
    fn open_connection(&self, _connection_string: &str) -> ProtocolResult<Option<Arc<dyn BackingConnection>>> {
        debug!("Opened replay connection");
        Ok(None)
    }

    fn begin_transaction(&self, _backing: Backing<'_>, _isolation_level: IsolationLevel) -> ProtocolResult<()> {
        Ok(())
    }

    fn commit(&self, _backing: Backing<'_>) -> ProtocolResult<()> {
        Ok(())
    }

    fn rollback(&self, _backing: Backing<'_>) -> ProtocolResult<()> {
        Ok(())
    }

    fn execute_non_query(&self, _backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<i64> {
        Ok(self.retriever.retrieve_non_query_row_count(criteria)?)
    }

    fn execute_scalar(&self, _backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<Value> {
        Ok(self.retriever.retrieve_scalar(criteria)?)
    }

    fn execute_reader(&self, _backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<Arc<Table>> {
        Ok(self.retriever.retrieve_rows(criteria)?)
    }
}

/// Protocol server that replays recorded results.
pub type SqlReplayer = SqlServer<ReplayExecutor>;

impl SqlServer<ReplayExecutor> {
    pub fn new(retriever: Arc<dyn QueryRetriever>) -> Self {
        Self::with_executor(ReplayExecutor::new(retriever))
    }
}
