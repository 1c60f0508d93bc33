//! Live executor: runs against a real database and feeds the recorder.

use std::sync::Arc;

use tracing::debug;

use super::executor::{require_backing, Backing, CommandExecutor};
use super::SqlServer;
use crate::backing::{BackingConnection, ConnectionFactory};
use crate::cache::{QueryCriteria, QueryRecorder, Table};
use crate::protocol::{IsolationLevel, ProtocolResult};
use crate::value::Value;

/// Executes every statement for real. After each successful execution the
/// matching recorder entry point is called, so the same text run as rows, as a
/// scalar and as a non-query lands under three separate cache keys. A failed
/// execution records nothing.
pub struct ProxyExecutor {
    factory: ConnectionFactory,
    recorder: Option<Arc<dyn QueryRecorder>>,
}

impl ProxyExecutor {
    pub fn new(factory: ConnectionFactory, recorder: Option<Arc<dyn QueryRecorder>>) -> Self {
        Self { factory, recorder }
    }
}

impl CommandExecutor for ProxyExecutor {
    fn open_connection(&self, connection_string: &str) -> ProtocolResult<Option<Arc<dyn BackingConnection>>> {
        let backing = (self.factory)(connection_string)?;
        debug!(backend = backing.backend_name(), "Opened backing connection");
        Ok(Some(backing))
    }

    fn begin_transaction(&self, backing: Backing<'_>, isolation_level: IsolationLevel) -> ProtocolResult<()> {
        require_backing(backing, "begin transaction")?.begin(isolation_level)?;
        Ok(())
    }

    fn commit(&self, backing: Backing<'_>) -> ProtocolResult<()> {
        require_backing(backing, "commit")?.commit()?;
        Ok(())
    }

    fn rollback(&self, backing: Backing<'_>) -> ProtocolResult<()> {
        require_backing(backing, "rollback")?.rollback()?;
        Ok(())
    }

    fn execute_non_query(&self, backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<i64> {
        let rows_affected = require_backing(backing, "execute non-query")?.execute_non_query(criteria)?;
        if let Some(recorder) = &self.recorder {
            recorder.record_non_query_row_count(criteria, rows_affected)?;
        }
        Ok(rows_affected)
    }

    fn execute_scalar(&self, backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<Value> {
        let value = require_backing(backing, "execute scalar")?.execute_scalar(criteria)?;
        if let Some(recorder) = &self.recorder {
            recorder.record_scalar(criteria)?;
        }
        Ok(value)
    }

    fn execute_reader(&self, backing: Backing<'_>, criteria: &QueryCriteria) -> ProtocolResult<Arc<Table>> {
        let table = Arc::new(require_backing(backing, "execute reader")?.execute_reader(criteria)?);
        if let Some(recorder) = &self.recorder {
            recorder.record_query(criteria)?;
        }
        Ok(table)
    }
}

/// Protocol server that talks to a live database.
pub type SqlProxy = SqlServer<ProxyExecutor>;

impl SqlServer<ProxyExecutor> {
    /// A proxy opening connections through `factory` and recording into
    /// `recorder` when one is given.
    pub fn new(factory: ConnectionFactory, recorder: Option<Arc<dyn QueryRecorder>>) -> Self {
        Self::with_executor(ProxyExecutor::new(factory, recorder))
    }

    /// A pass-through proxy that records nothing.
    pub fn without_recording(factory: ConnectionFactory) -> Self {
        Self::new(factory, None)
    }
}
